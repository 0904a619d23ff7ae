//! Hosted demo: the link engine wired to a simulated companion.
//!
//! A background thread plays the companion firmware: it receives framed
//! commands through a channel (the "UART transmit" direction) and answers by
//! pushing bytes into the receive ring and raising the wake signal, exactly
//! as a receive interrupt would. The main thread owns the connection and
//! drives everything through the blocking helper; its poll delay waits on
//! the wake signal instead of spinning.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use httplink::blocking::request_and_parse;
use httplink::error::AcquireError;
use httplink::link::{Config, Connection};
use httplink::storage::StorageSink;
use httplink::transport::{
    Delay, IsrSender, RxQueue, SerialControl, SerialPort, Watchdog, WakeSignal,
};

/// Wake signal backed by a mutex/condvar pair.
struct CondvarSignal {
    pending: Mutex<bool>,
    cv: Condvar,
}

impl CondvarSignal {
    fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn wait_timeout(&self, timeout: Duration) {
        let guard = self.pending.lock().unwrap();
        let (mut guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |pending| !*pending)
            .unwrap();
        *guard = false;
    }
}

impl WakeSignal for CondvarSignal {
    fn notify(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending = true;
        self.cv.notify_one();
    }

    fn wait(&self) {
        let guard = self.pending.lock().unwrap();
        let mut guard = self.cv.wait_while(guard, |pending| !*pending).unwrap();
        *guard = false;
    }
}

/// Poll delay that sleeps on the wake signal, so a burst of inbound bytes is
/// pumped as soon as it lands rather than on the next tick.
struct SignalDelay(Arc<CondvarSignal>);

impl Delay for SignalDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.wait_timeout(Duration::from_millis(ms as u64));
    }
}

/// The "UART transmit" direction: framed commands go to the companion
/// thread over a channel.
struct PipePort {
    tx: mpsc::Sender<Vec<u8>>,
}

impl SerialPort for PipePort {
    type Error = mpsc::SendError<Vec<u8>>;

    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.tx.send(buf.to_vec())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct PipeControl {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl SerialControl for PipeControl {
    type Port = PipePort;

    fn acquire(&mut self, _baud: u32) -> Result<PipePort, AcquireError> {
        let tx = self.tx.take().ok_or(AcquireError::Busy)?;
        Ok(PipePort { tx })
    }
}

/// Wall-clock watchdog.
struct ClockWatchdog {
    deadline: Option<std::time::Instant>,
}

impl Watchdog for ClockWatchdog {
    fn start(&mut self, duration_ms: u32) {
        self.deadline =
            Some(std::time::Instant::now() + Duration::from_millis(duration_ms as u64));
    }

    fn restart(&mut self, duration_ms: u32) {
        self.start(duration_ms);
    }

    fn stop(&mut self) {
        self.deadline = None;
    }

    fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    fn has_expired(&self) -> bool {
        matches!(self.deadline, Some(d) if std::time::Instant::now() >= d)
    }
}

/// Filesystem sink: each flush is one open-write-close cycle.
struct FsSink;

impl StorageSink for FsSink {
    type Error = std::io::Error;

    fn append(&mut self, path: &str, data: &[u8], truncate: bool) -> Result<(), Self::Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(!truncate)
            .write(true)
            .truncate(truncate)
            .open(path)?;
        file.write_all(data)
    }
}

/// The companion thread: answers each framed command the way the firmware
/// on the second microcontroller would.
fn companion(
    rx: mpsc::Receiver<Vec<u8>>,
    mut isr: IsrSender<'static>,
    signal: Arc<CondvarSignal>,
) {
    let mut reply = |bytes: &[u8]| {
        for &byte in bytes {
            isr.send(byte);
        }
        signal.notify();
    };

    while let Ok(frame) = rx.recv() {
        let command = String::from_utf8_lossy(&frame);
        let command = command.trim_end();
        if command == "[PING]" {
            reply(b"[PONG]\n");
        } else if command.starts_with("[GET/BYTES]") {
            reply(b"[GET/SUCCESS]\n");
            reply(b"\x00\x01\x02 pretend firmware image bytes \xDE\xAD\xBE\xEF\n");
            reply(b"[GET/END]\n");
        } else if command.starts_with("[GET]") {
            reply(b"[GET/SUCCESS]\n");
            reply(b"{\"ip\":\"203.0.113.7\",\"status\":\"ok\"}\n");
            reply(b"[GET/END]\n");
        } else {
            reply(b"[ERROR] unsupported command\n");
        }
    }
}

fn main() {
    let queue: &'static mut RxQueue = Box::leak(Box::new(RxQueue::new()));
    let (isr, rx) = queue.split();
    let signal = Arc::new(CondvarSignal::new());

    let (frame_tx, frame_rx) = mpsc::channel();
    let companion_signal = signal.clone();
    thread::spawn(move || companion(frame_rx, isr, companion_signal));

    let mut control = PipeControl { tx: Some(frame_tx) };
    let mut conn = Connection::open(
        &mut control,
        Config::default(),
        rx,
        FsSink,
        ClockWatchdog { deadline: None },
    )
    .expect("failed to open the link");
    let mut delay = SignalDelay(signal);

    // Confirm the link.
    conn.ping().expect("ping rejected");
    while conn.state() != httplink::protocol::LinkState::Idle {
        delay.delay_ms(httplink::blocking::POLL_INTERVAL_MS);
        conn.pump();
    }
    println!("link confirmed");

    // A text request through the blocking helper.
    let body: String = request_and_parse(
        &mut conn,
        &mut delay,
        |conn| conn.get("https://api.ipify.org?format=json"),
        |conn| {
            let body = conn.body();
            (!body.is_empty()).then(|| body.to_string())
        },
    )
    .expect("request failed");
    print!("response body: {body}");

    // A binary request streamed straight to disk.
    let path = std::env::temp_dir().join("httplink-demo.bin");
    let path = path.to_string_lossy().into_owned();
    request_and_parse(
        &mut conn,
        &mut delay,
        |conn| conn.get_bytes("https://example.com/fw.bin", &Default::default(), &path),
        |_conn| Some(()),
    )
    .expect("download failed");
    println!("saved binary response to {path}");

    conn.close().expect("close failed");
}
