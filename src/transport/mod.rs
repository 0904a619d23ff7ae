//! Transport abstraction: serial port traits and the ISR-to-consumer ring.
//!
//! The receive path is split the way interrupt-driven UART drivers are
//! structured: the interrupt handler does byte-only work (push one byte into
//! a bounded ring, signal the consumer) and everything with logic in it runs
//! on the consumer side. [`RxQueue`] provides the ring; its two halves are
//! [`IsrSender`] (safe to use from interrupt context) and [`RxReceiver`]
//! (owned by the [`crate::link::Connection`]).
//!
//! Platform glue order matters when bringing a link up: create the queue,
//! split it, start the consumer task, and only then enable hardware receive,
//! so the earliest bytes are never lost.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::error::AcquireError;
use crate::protocol::RX_QUEUE_SIZE;

/// A serial port that the link can write framed commands to.
///
/// Reads never go through this trait; inbound bytes arrive through the
/// [`IsrSender`] half of the ring instead.
pub trait SerialPort {
    /// Associated error type.
    type Error: core::fmt::Debug;
    /// Write the entire buffer to the port.
    fn write(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
    /// Block until pending output has left the transmitter.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Exclusive access to a platform's serial device.
///
/// `acquire` hands out the one port object for the device; a second acquire
/// while the first owner is alive must fail with [`AcquireError::Busy`].
pub trait SerialControl {
    /// The port type produced on successful acquisition.
    type Port: SerialPort;
    /// Acquire and initialize the device at the given baud rate.
    fn acquire(&mut self, baud: u32) -> Result<Self::Port, AcquireError>;
}

/// A restartable single-shot timer used to detect stalled transfers.
///
/// Implementations are polled, not callback-driven: after `start`, the timer
/// must report `has_expired() == true` once the duration elapses without an
/// intervening `restart` or `stop`, and keep reporting it until reset. This
/// keeps every state transition on the engine's own call stack.
pub trait Watchdog {
    /// Arm the timer for `duration_ms` milliseconds.
    fn start(&mut self, duration_ms: u32);
    /// Re-arm the running timer for a fresh `duration_ms`.
    fn restart(&mut self, duration_ms: u32);
    /// Disarm the timer.
    fn stop(&mut self);
    /// Whether the timer is armed and has not yet expired or been stopped.
    fn is_running(&self) -> bool;
    /// Whether the armed duration has elapsed.
    fn has_expired(&self) -> bool;
}

/// A blocking delay, used by the synchronous request helper between polls.
pub trait Delay {
    /// Sleep the calling context for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Wake-up signal between the interrupt handler and the consumer task.
///
/// `notify` is called from interrupt context and must not block, allocate, or
/// take locks. `wait` blocks the consumer until the next notification.
pub trait WakeSignal {
    /// Signal that bytes are available. Interrupt-safe.
    fn notify(&self);
    /// Block until notified.
    fn wait(&self);
}

/// Bounded single-producer single-consumer byte ring between the receive
/// interrupt and the consumer task.
///
/// The queue itself is typically placed in a `static` so both halves can
/// reference it for the life of the program:
///
/// ```
/// use httplink::transport::RxQueue;
///
/// static mut RX: RxQueue = RxQueue::new();
/// // SAFETY: split exactly once, before the ISR is enabled.
/// let (isr, rx) = unsafe { (&mut *&raw mut RX).split() };
/// # let _ = (isr, rx);
/// ```
pub struct RxQueue {
    inner: Queue<u8, RX_QUEUE_SIZE>,
}

impl RxQueue {
    /// Create an empty ring.
    pub const fn new() -> Self {
        Self {
            inner: Queue::new(),
        }
    }

    /// Split the ring into its interrupt half and its consumer half.
    pub fn split(&mut self) -> (IsrSender<'_>, RxReceiver<'_>) {
        let (producer, consumer) = self.inner.split();
        (IsrSender { producer }, RxReceiver { consumer })
    }
}

impl Default for RxQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RxQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxQueue")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// The interrupt-context half of the receive ring.
///
/// `send` does no allocation, locking, or blocking, so it is safe to call
/// from a receive interrupt. Back-pressure is refusal: when the ring is full
/// the byte is dropped and `send` returns `false`. The ring is sized so this
/// does not happen at sustained line rates; under overload it is a known
/// lossy edge.
pub struct IsrSender<'q> {
    producer: Producer<'q, u8, RX_QUEUE_SIZE>,
}

impl<'q> core::fmt::Debug for IsrSender<'q> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IsrSender").finish_non_exhaustive()
    }
}

impl<'q> IsrSender<'q> {
    /// Push one received byte. Returns `false` if the ring was full and the
    /// byte was dropped.
    pub fn send(&mut self, byte: u8) -> bool {
        self.producer.enqueue(byte).is_ok()
    }
}

/// The consumer half of the receive ring, owned by the connection.
pub struct RxReceiver<'q> {
    consumer: Consumer<'q, u8, RX_QUEUE_SIZE>,
}

impl<'q> core::fmt::Debug for RxReceiver<'q> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxReceiver").finish_non_exhaustive()
    }
}

impl<'q> RxReceiver<'q> {
    /// Take the next byte in receipt order, if any.
    pub fn recv(&mut self) -> Option<u8> {
        self.consumer.dequeue()
    }

    /// Whether any bytes are waiting.
    pub fn is_empty(&self) -> bool {
        !self.consumer.ready()
    }
}
