//! Common error types for the serial link and command encoder.

/// Errors raised while opening or closing the serial transport.
///
/// These are lifecycle errors: once [`crate::link::Connection::open`] has
/// succeeded, only [`DoubleClose`](TransportError::DoubleClose) can still
/// occur. Setup failures never leave a partially initialized connection
/// behind.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransportError {
    /// The serial device is already owned by someone else.
    DeviceBusy,
    /// The serial device exists but could not be initialized.
    InitFailed,
    /// `close` was called on an already-closed connection.
    DoubleClose,
}

/// Errors a platform's [`crate::transport::SerialControl`] implementation may
/// report when acquiring the serial device.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AcquireError {
    /// The device is held by another owner.
    Busy,
    /// The device could not be configured at the requested baud rate.
    Init,
}

/// Errors raised while encoding and transmitting an outbound command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SendError {
    /// The command string was empty.
    EmptyCommand,
    /// The framed command (payload plus newline) does not fit the fixed
    /// transmit buffer. The buffer is intentionally small; callers must keep
    /// URLs and headers compact.
    TooLong,
    /// The link has not been confirmed yet. Only `[PING]` and
    /// `[WIFI/CONNECT]` may be sent while inactive.
    LinkInactive,
    /// A response is still being received. The protocol is strictly
    /// half-duplex with at most one request in flight.
    Busy,
    /// The connection has been closed.
    Closed,
    /// The serial port rejected the write.
    WriteFailed,
}

/// Errors surfaced by the blocking request helper
/// [`crate::blocking::request_and_parse`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestError {
    /// The initial send failed; the wrapped error says why.
    SendFailed(SendError),
    /// The watchdog expired before the response completed.
    Timeout,
    /// The companion reported `[ERROR]` or the transfer was abandoned.
    Issue,
    /// The caller-supplied parser rejected the response. Protocol state is
    /// unaffected.
    ParseFailed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TransportError::DeviceBusy => defmt::write!(f, "DeviceBusy"),
            TransportError::InitFailed => defmt::write!(f, "InitFailed"),
            TransportError::DoubleClose => defmt::write!(f, "DoubleClose"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AcquireError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            AcquireError::Busy => defmt::write!(f, "Busy"),
            AcquireError::Init => defmt::write!(f, "Init"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SendError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SendError::EmptyCommand => defmt::write!(f, "EmptyCommand"),
            SendError::TooLong => defmt::write!(f, "TooLong"),
            SendError::LinkInactive => defmt::write!(f, "LinkInactive"),
            SendError::Busy => defmt::write!(f, "Busy"),
            SendError::Closed => defmt::write!(f, "Closed"),
            SendError::WriteFailed => defmt::write!(f, "WriteFailed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RequestError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            RequestError::SendFailed(e) => defmt::write!(f, "SendFailed({})", e),
            RequestError::Timeout => defmt::write!(f, "Timeout"),
            RequestError::Issue => defmt::write!(f, "Issue"),
            RequestError::ParseFailed => defmt::write!(f, "ParseFailed"),
        }
    }
}
