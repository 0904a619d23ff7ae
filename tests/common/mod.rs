//! Shared mocks and harness for the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use httplink::error::AcquireError;
use httplink::link::{Config, Connection};
use httplink::protocol::LinkState;
use httplink::storage::StorageSink;
use httplink::transport::{
    Delay, IsrSender, RxQueue, SerialControl, SerialPort, Watchdog,
};

// -------------------------
// Serial port mock
// -------------------------

pub struct MockPort {
    pub written: Rc<RefCell<Vec<u8>>>,
    pub fail_writes: Rc<Cell<bool>>,
}

impl SerialPort for MockPort {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes.get() {
            return Err(());
        }
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Serial device mock: hands out one `MockPort`, or fails on request.
pub enum MockControl {
    Available {
        written: Rc<RefCell<Vec<u8>>>,
        fail_writes: Rc<Cell<bool>>,
    },
    Busy,
    Broken,
}

impl SerialControl for MockControl {
    type Port = MockPort;

    fn acquire(&mut self, _baud: u32) -> Result<MockPort, AcquireError> {
        match self {
            MockControl::Available {
                written,
                fail_writes,
            } => Ok(MockPort {
                written: written.clone(),
                fail_writes: fail_writes.clone(),
            }),
            MockControl::Busy => Err(AcquireError::Busy),
            MockControl::Broken => Err(AcquireError::Init),
        }
    }
}

// -------------------------
// Watchdog mock
// -------------------------

#[derive(Default)]
pub struct WatchdogState {
    pub running: bool,
    pub expired: bool,
    pub starts: usize,
    pub restarts: usize,
}

pub type WatchdogHandle = Rc<RefCell<WatchdogState>>;

pub struct MockWatchdog(pub WatchdogHandle);

impl Watchdog for MockWatchdog {
    fn start(&mut self, _duration_ms: u32) {
        let mut s = self.0.borrow_mut();
        s.running = true;
        s.expired = false;
        s.starts += 1;
    }

    fn restart(&mut self, _duration_ms: u32) {
        let mut s = self.0.borrow_mut();
        s.running = true;
        s.expired = false;
        s.restarts += 1;
    }

    fn stop(&mut self) {
        let mut s = self.0.borrow_mut();
        s.running = false;
        s.expired = false;
    }

    fn is_running(&self) -> bool {
        self.0.borrow().running
    }

    fn has_expired(&self) -> bool {
        let s = self.0.borrow();
        s.running && s.expired
    }
}

// -------------------------
// Storage sink mock
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: String,
    pub data: Vec<u8>,
    pub truncate: bool,
}

pub struct MockSink {
    pub log: Rc<RefCell<Vec<FileWrite>>>,
    pub fail: Rc<Cell<bool>>,
}

impl StorageSink for MockSink {
    type Error = ();

    fn append(&mut self, path: &str, data: &[u8], truncate: bool) -> Result<(), Self::Error> {
        if self.fail.get() {
            return Err(());
        }
        self.log.borrow_mut().push(FileWrite {
            path: path.to_string(),
            data: data.to_vec(),
            truncate,
        });
        Ok(())
    }
}

// -------------------------
// Delay mock
// -------------------------

/// Counts poll sleeps; can force watchdog expiry after a number of polls so
/// timeout paths terminate.
pub struct MockDelay {
    pub calls: usize,
    pub expire_after: Option<(usize, WatchdogHandle)>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self {
            calls: 0,
            expire_after: None,
        }
    }

    pub fn expiring(after: usize, watchdog: WatchdogHandle) -> Self {
        Self {
            calls: 0,
            expire_after: Some((after, watchdog)),
        }
    }
}

impl Delay for MockDelay {
    fn delay_ms(&mut self, _ms: u32) {
        self.calls += 1;
        if let Some((after, watchdog)) = &self.expire_after {
            if self.calls >= *after {
                watchdog.borrow_mut().expired = true;
            }
        }
    }
}

// -------------------------
// Harness
// -------------------------

/// A connection wired to mocks, with handles for inspecting every side
/// effect and an `IsrSender` for injecting inbound bytes.
pub struct Harness<'q> {
    pub conn: Connection<'q, MockPort, MockSink, MockWatchdog>,
    pub isr: IsrSender<'q>,
    pub written: Rc<RefCell<Vec<u8>>>,
    pub fail_writes: Rc<Cell<bool>>,
    pub files: Rc<RefCell<Vec<FileWrite>>>,
    pub sink_fail: Rc<Cell<bool>>,
    pub watchdog: WatchdogHandle,
}

impl<'q> Harness<'q> {
    pub fn new(queue: &'q mut RxQueue) -> Self {
        let (isr, rx) = queue.split();
        let written = Rc::new(RefCell::new(Vec::new()));
        let fail_writes = Rc::new(Cell::new(false));
        let files = Rc::new(RefCell::new(Vec::new()));
        let sink_fail = Rc::new(Cell::new(false));
        let watchdog: WatchdogHandle = Rc::new(RefCell::new(WatchdogState::default()));

        let mut control = MockControl::Available {
            written: written.clone(),
            fail_writes: fail_writes.clone(),
        };
        let sink = MockSink {
            log: files.clone(),
            fail: sink_fail.clone(),
        };
        let conn = Connection::open(
            &mut control,
            Config::default(),
            rx,
            sink,
            MockWatchdog(watchdog.clone()),
        )
        .unwrap();

        Harness {
            conn,
            isr,
            written,
            fail_writes,
            files,
            sink_fail,
            watchdog,
        }
    }

    /// Inject raw inbound bytes, as the receive interrupt would.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            assert!(self.isr.send(byte), "receive ring overflowed in test");
        }
    }

    /// Inject one line, newline-terminated.
    pub fn feed_line(&mut self, line: &str) {
        self.feed(line.as_bytes());
        self.feed(b"\n");
    }

    /// Run the ping/pong handshake so the link is confirmed idle.
    pub fn confirm_link(&mut self) {
        self.conn.ping().unwrap();
        self.feed_line("[PONG]");
        self.conn.pump();
        assert_eq!(self.conn.state(), LinkState::Idle);
        self.written.borrow_mut().clear();
    }

    /// Drain and return everything written to the port so far.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.written.borrow_mut())
    }

    pub fn force_timeout(&mut self) {
        self.watchdog.borrow_mut().expired = true;
    }
}
