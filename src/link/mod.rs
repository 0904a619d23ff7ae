//! The serial link engine: connection lifecycle, byte/line reassembly, and
//! the request state machine.
//!
//! A [`Connection`] owns the serial port, the consumer half of the receive
//! ring, the storage sink, and the watchdog. All protocol logic runs inside
//! [`Connection::pump`], which the consumer task calls after each wake-up:
//! it drains every available byte, feeds the binary-capture path when a bytes
//! transfer is active, reassembles newline-delimited lines, and classifies
//! each line into a state transition.
//!
//! The engine is single-threaded by design. The only type intended to cross
//! into interrupt context is [`crate::transport::IsrSender`]; everything here
//! takes `&mut self`, and platform glue provides mutual exclusion between the
//! consumer task and the caller (see the host demo application for a hosted
//! wiring with a worker thread and a condition-variable wake signal).

use core::str;

use heapless::{String, Vec};

use crate::error::{AcquireError, SendError, TransportError};
use crate::protocol::{
    FILE_CHUNK_SIZE, LINE_BUFFER_SIZE, LinkState, MAX_PATH_LEN, Marker, RESPONSE_BUFFER_SIZE,
    TX_BUFFER_SIZE, Verb, WATCHDOG_MS, classify,
};
use crate::storage::StorageSink;
use crate::transport::{RxReceiver, SerialControl, SerialPort, Watchdog};

/// Connection parameters.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// UART baud rate. Defaults to [`crate::protocol::BAUD_RATE`].
    pub baud: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud: crate::protocol::BAUD_RATE,
        }
    }
}

/// One in-flight response transfer. Created when a `[<VERB>/SUCCESS]` line is
/// classified, destroyed on the matching `[<VERB>/END]` or watchdog expiry.
/// Holding at most one of these makes the single-request-in-flight invariant
/// structural.
#[derive(Debug, Clone, Copy)]
struct Transfer {
    verb: Verb,
    /// Divert raw bytes to the destination file instead of the text buffer.
    save_bytes: bool,
    /// Persist text body lines to the destination file.
    save_lines: bool,
    /// Whether the first flush has happened; the first flush truncates, the
    /// rest append.
    started: bool,
}

/// A live serial link to the companion device.
///
/// Exactly one `Connection` exists per physical serial device: the port is
/// handed out exclusively by [`SerialControl::acquire`] and owned here until
/// [`Connection::close`].
pub struct Connection<'q, P: SerialPort, S: StorageSink, W: Watchdog> {
    port: Option<P>,
    rx: RxReceiver<'q>,
    sink: S,
    watchdog: W,
    state: LinkState,
    transfer: Option<Transfer>,
    /// The next GET/POST transfer diverts bytes to the destination file.
    bytes_request: bool,
    /// Persist text body lines of the next transfer to the destination file.
    save_lines: bool,
    file_path: String<MAX_PATH_LEN>,
    line_buf: Vec<u8, LINE_BUFFER_SIZE>,
    chunk: Vec<u8, FILE_CHUNK_SIZE>,
    response: String<RESPONSE_BUFFER_SIZE>,
    last_response: String<RESPONSE_BUFFER_SIZE>,
    timed_out: bool,
}

impl<'q, P, S, W> core::fmt::Debug for Connection<'q, P, S, W>
where
    P: SerialPort,
    S: StorageSink,
    W: Watchdog,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("active_verb", &self.transfer.map(|t| t.verb))
            .field("closed", &self.port.is_none())
            .finish_non_exhaustive()
    }
}

impl<'q, P, S, W> Connection<'q, P, S, W>
where
    P: SerialPort,
    S: StorageSink,
    W: Watchdog,
{
    /// Acquire the serial device and build a connection around it.
    ///
    /// Fails with [`TransportError::DeviceBusy`] if the device already has an
    /// owner and [`TransportError::InitFailed`] if it cannot be brought up at
    /// the requested baud rate. No partial state is left behind on failure.
    ///
    /// Platform glue should start the consumer task before enabling hardware
    /// receive so the earliest bytes are not lost.
    pub fn open<C>(
        control: &mut C,
        config: Config,
        rx: RxReceiver<'q>,
        sink: S,
        watchdog: W,
    ) -> Result<Self, TransportError>
    where
        C: SerialControl<Port = P>,
    {
        let port = control.acquire(config.baud).map_err(|e| match e {
            AcquireError::Busy => TransportError::DeviceBusy,
            AcquireError::Init => TransportError::InitFailed,
        })?;
        Ok(Self {
            port: Some(port),
            rx,
            sink,
            watchdog,
            state: LinkState::Inactive,
            transfer: None,
            bytes_request: false,
            save_lines: false,
            file_path: String::new(),
            line_buf: Vec::new(),
            chunk: Vec::new(),
            response: String::new(),
            last_response: String::new(),
            timed_out: false,
        })
    }

    /// Release the serial device.
    ///
    /// Safe to call while a transfer is active: the transfer is abandoned and
    /// no further sink writes happen once close begins. Calling a second time
    /// returns [`TransportError::DoubleClose`].
    pub fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_none() {
            return Err(TransportError::DoubleClose);
        }
        self.watchdog.stop();
        self.transfer = None;
        self.bytes_request = false;
        self.chunk.clear();
        self.state = LinkState::Inactive;
        Ok(())
    }

    /// Current state of the link.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The most recent non-empty line received, end markers excluded.
    ///
    /// Still valid after the state machine has moved to
    /// [`LinkState::Issue`], so callers can surface the last error text.
    pub fn last_response(&self) -> &str {
        self.last_response.as_str()
    }

    /// Body text accumulated by the most recent text transfer.
    ///
    /// Bounded at [`RESPONSE_BUFFER_SIZE`] bytes; lines past the bound are
    /// dropped. Binary transfers leave this empty (their data goes to the
    /// destination file).
    pub fn body(&self) -> &str {
        self.response.as_str()
    }

    /// Whether a response transfer for `verb` is currently in flight.
    pub fn is_receiving(&self, verb: Verb) -> bool {
        matches!(self.transfer, Some(t) if t.verb == verb)
    }

    /// The verb of the in-flight transfer, if any. At most one transfer is
    /// ever active.
    pub fn active_verb(&self) -> Option<Verb> {
        self.transfer.map(|t| t.verb)
    }

    /// Whether [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.port.is_none()
    }

    /// Set the destination file for persisted response data and enable
    /// line-by-line persistence for the next text transfer.
    ///
    /// Cleared automatically when the transfer completes or is abandoned;
    /// persistence is per-request opt-in. Returns `false` if the path does
    /// not fit [`MAX_PATH_LEN`].
    pub fn save_response_to(&mut self, path: &str) -> bool {
        self.file_path.clear();
        if self.file_path.push_str(path).is_err() {
            return false;
        }
        self.save_lines = true;
        true
    }

    /// Arm the watchdog and mark the link as receiving, without waiting for
    /// the first response line.
    ///
    /// Used by the blocking helper so a companion that never answers at all
    /// is still caught by the watchdog.
    pub fn begin_receive(&mut self) {
        self.timed_out = false;
        self.watchdog.start(WATCHDOG_MS);
        self.state = LinkState::Receiving;
    }

    /// Whether the watchdog is currently armed.
    pub fn watchdog_running(&self) -> bool {
        self.watchdog.is_running()
    }

    /// Disarm the watchdog.
    pub fn stop_watchdog(&mut self) {
        self.watchdog.stop();
    }

    /// Whether the most recent transition to [`LinkState::Issue`] was caused
    /// by watchdog expiry rather than an `[ERROR]` line.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Frame and transmit one bracketed command.
    ///
    /// Appends the newline terminator and writes the frame to the port.
    /// Rejection rules, in order: empty command
    /// ([`SendError::EmptyCommand`]); a transfer in flight or a write in
    /// progress ([`SendError::Busy`]); framed length over the transmit buffer
    /// ([`SendError::TooLong`]); link not yet confirmed and the command is
    /// neither `[PING]` nor `[WIFI/CONNECT]` ([`SendError::LinkInactive`]).
    ///
    /// On success the state passes through [`LinkState::Sending`] and back to
    /// [`LinkState::Idle`]; that return is provisional, the authoritative
    /// state arrives with the first response line.
    pub fn send_command(&mut self, command: &str) -> Result<(), SendError> {
        if command.is_empty() {
            return Err(SendError::EmptyCommand);
        }
        if self.transfer.is_some()
            || matches!(self.state, LinkState::Receiving | LinkState::Sending)
        {
            return Err(SendError::Busy);
        }
        if command.len() + 1 > TX_BUFFER_SIZE {
            return Err(SendError::TooLong);
        }
        if self.state == LinkState::Inactive
            && !command.starts_with("[PING]")
            && !command.starts_with("[WIFI/CONNECT]")
        {
            return Err(SendError::LinkInactive);
        }
        let port = self.port.as_mut().ok_or(SendError::Closed)?;

        let mut frame: Vec<u8, TX_BUFFER_SIZE> = Vec::new();
        frame
            .extend_from_slice(command.as_bytes())
            .map_err(|_| SendError::TooLong)?;
        frame.push(b'\n').map_err(|_| SendError::TooLong)?;

        self.state = LinkState::Sending;
        let written = port.write(&frame).and_then(|_| port.flush());
        self.state = LinkState::Idle;
        written.map_err(|_| SendError::WriteFailed)
    }

    /// Drain every byte currently waiting in the receive ring, then apply
    /// watchdog expiry if the deadline has passed.
    ///
    /// This is the consumer task's whole job: call it after each wake-up
    /// signal. It is also called by the blocking helper on each poll, so
    /// single-threaded deployments need no consumer task at all.
    pub fn pump(&mut self) {
        while let Some(byte) = self.rx.recv() {
            self.ingest(byte);
        }
        self.check_watchdog();
    }

    /// Set the destination path for a binary transfer and divert the next
    /// GET/POST response to it.
    pub(crate) fn arm_bytes_capture(&mut self, path: &str) -> Result<(), SendError> {
        self.file_path.clear();
        if self.file_path.push_str(path).is_err() {
            return Err(SendError::TooLong);
        }
        self.bytes_request = true;
        Ok(())
    }

    pub(crate) fn disarm_bytes_capture(&mut self) {
        self.bytes_request = false;
    }

    /// Drop back to the unconfirmed state; only `[PONG]` brings it back.
    pub(crate) fn mark_inactive(&mut self) {
        self.state = LinkState::Inactive;
    }

    fn ingest(&mut self, byte: u8) {
        if matches!(self.transfer, Some(t) if t.save_bytes) {
            self.capture_byte(byte);
        }
        // The line path always runs: control markers are line-terminated text
        // even in the middle of a binary stream.
        if byte == b'\n' {
            self.complete_line();
        } else if self.line_buf.push(byte).is_err() {
            // Memory bound reached: deliver the line truncated, then start a
            // fresh line with the byte that did not fit.
            self.complete_line();
            let _ = self.line_buf.push(byte);
        }
    }

    fn capture_byte(&mut self, byte: u8) {
        let _ = self.chunk.push(byte);
        if self.chunk.is_full() {
            self.flush_chunk();
        }
    }

    /// Write the chunk buffer to the destination file, truncating on the
    /// first flush of the transfer. A sink failure abandons the transfer.
    fn flush_chunk(&mut self) {
        if self.chunk.is_empty() {
            return;
        }
        let truncate = match self.transfer.as_mut() {
            Some(t) => {
                let truncate = !t.started;
                t.started = true;
                truncate
            }
            None => {
                self.chunk.clear();
                return;
            }
        };
        let result = self
            .sink
            .append(self.file_path.as_str(), &self.chunk, truncate);
        self.chunk.clear();
        if result.is_err() {
            self.fail_transfer(false);
        }
    }

    fn complete_line(&mut self) {
        let mut line: Vec<u8, LINE_BUFFER_SIZE> = Vec::new();
        core::mem::swap(&mut line, &mut self.line_buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match str::from_utf8(&line) {
            Ok(text) => self.handle_line(text),
            Err(_) => {
                // Binary payload flowing through the line path: counts as
                // link activity but carries no marker.
                if self.transfer.is_some() {
                    self.watchdog.restart(WATCHDOG_MS);
                }
            }
        }
    }

    /// Classify one reassembled line and apply the resulting transition.
    fn handle_line(&mut self, line: &str) {
        let trimmed = line.trim();
        let marker = classify(trimmed);

        if !trimmed.is_empty() && !matches!(marker, Marker::VerbEnd(_)) {
            self.last_response.clear();
            let _ = self
                .last_response
                .push_str(clamp_str(trimmed, RESPONSE_BUFFER_SIZE));
        }

        if let Some(active) = self.transfer {
            if marker == Marker::VerbEnd(active.verb) {
                self.finish_transfer();
                return;
            }
            // Body content: any line, marker-shaped or not, refreshes the
            // stall deadline.
            self.watchdog.restart(WATCHDOG_MS);
            if !active.save_bytes {
                self.append_body_line(line, active.save_lines);
            }
            return;
        }

        match marker {
            Marker::Pong => {
                // The only way out of Inactive short of an explicit
                // disconnect.
                self.state = LinkState::Idle;
            }
            Marker::ErrorReport => {
                self.timed_out = false;
                self.reset_request_flags();
                self.state = LinkState::Issue;
            }
            Marker::VerbSuccess(verb) => self.begin_transfer(verb),
            Marker::Success | Marker::Info | Marker::Disconnected | Marker::VerbEnd(_) => {
                if self.state != LinkState::Inactive {
                    self.state = LinkState::Idle;
                }
            }
            Marker::Other => {
                if self.state != LinkState::Inactive {
                    self.state = LinkState::Idle;
                }
            }
        }
    }

    fn begin_transfer(&mut self, verb: Verb) {
        // Binary diversion applies to GET and POST only; PUT and DELETE
        // results are always persisted when a destination is configured.
        let save_bytes = self.bytes_request && matches!(verb, Verb::Get | Verb::Post);
        let save_lines = match verb {
            Verb::Put | Verb::Delete => !self.file_path.is_empty(),
            Verb::Get | Verb::Post => {
                !save_bytes && self.save_lines && !self.file_path.is_empty()
            }
        };
        self.response.clear();
        self.chunk.clear();
        self.transfer = Some(Transfer {
            verb,
            save_bytes,
            save_lines,
            started: false,
        });
        self.timed_out = false;
        self.watchdog.start(WATCHDOG_MS);
        self.state = LinkState::Receiving;
    }

    /// A matching `[<VERB>/END]` arrived: flush the remainder, strip the
    /// marker bytes from a binary tail, and return to idle. Completion with
    /// zero received data is still completion (empty result).
    fn finish_transfer(&mut self) {
        let Some(active) = self.transfer.take() else {
            return;
        };
        self.watchdog.stop();
        if active.save_bytes {
            self.strip_capture_tail(active.verb);
            if !self.chunk.is_empty() {
                let result =
                    self.sink
                        .append(self.file_path.as_str(), &self.chunk, !active.started);
                self.chunk.clear();
                if result.is_err() {
                    self.reset_request_flags();
                    self.state = LinkState::Issue;
                    return;
                }
            }
        }
        self.reset_request_flags();
        self.state = LinkState::Idle;
    }

    /// Remove the end-marker text (and its framing newline) from the tail of
    /// the unflushed chunk, so the persisted file ends exactly at the
    /// payload.
    ///
    /// The protocol contract is that the marker appears only at the true end
    /// of the stream. A marker that straddles an already-flushed chunk
    /// boundary cannot be removed retroactively; that ambiguity is inherited
    /// from the wire protocol.
    fn strip_capture_tail(&mut self, verb: Verb) {
        let marker = verb.end_marker().as_bytes();
        if let Some(pos) = find_last(&self.chunk, marker) {
            self.chunk.truncate(pos);
            if self.chunk.last() == Some(&b'\n') {
                self.chunk.pop();
            }
            if self.chunk.last() == Some(&b'\r') {
                self.chunk.pop();
            }
        }
    }

    /// Accumulate one text body line and, when persistence is on, append it
    /// to the destination file.
    fn append_body_line(&mut self, line: &str, save: bool) {
        // Bounded accumulation: a line past the buffer capacity is dropped.
        let _ = self.response.push_str(line);
        let _ = self.response.push('\n');

        if save && !self.file_path.is_empty() {
            let truncate = match self.transfer.as_mut() {
                Some(t) => {
                    let truncate = !t.started;
                    t.started = true;
                    truncate
                }
                None => return,
            };
            let mut buf: Vec<u8, { LINE_BUFFER_SIZE + 1 }> = Vec::new();
            let _ = buf.extend_from_slice(line.as_bytes());
            let _ = buf.push(b'\n');
            if self
                .sink
                .append(self.file_path.as_str(), &buf, truncate)
                .is_err()
            {
                self.fail_transfer(false);
            }
        }
    }

    /// Abandon the in-flight transfer and land in [`LinkState::Issue`]. The
    /// partially written file stays on disk; callers must treat it as
    /// untrustworthy and re-request.
    fn fail_transfer(&mut self, timed_out: bool) {
        self.watchdog.stop();
        self.transfer = None;
        self.chunk.clear();
        self.timed_out = timed_out;
        self.reset_request_flags();
        self.state = LinkState::Issue;
    }

    fn reset_request_flags(&mut self) {
        self.bytes_request = false;
        self.save_lines = false;
        self.file_path.clear();
    }

    /// Watchdog expiry is the sole recovery from a companion that goes
    /// silent mid-response. No automatic retry: the caller re-issues after
    /// observing [`LinkState::Issue`].
    fn check_watchdog(&mut self) {
        if self.watchdog.has_expired() {
            self.fail_transfer(true);
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a
/// character.
fn clamp_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Position of the last occurrence of `needle` in `haystack`.
fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}
