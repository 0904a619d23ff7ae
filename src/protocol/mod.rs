//! Wire-level protocol definitions: control markers, verbs, link state.
//!
//! The companion firmware frames every protocol event as a bracketed token
//! inside a newline-terminated ASCII line, e.g. `[GET/SUCCESS]` or `[PONG]`.
//! This module classifies a reassembled line into a [`Marker`] so the state
//! machine in [`crate::link`] never does raw substring bookkeeping itself.

/// Default UART baud rate used by the companion firmware.
pub const BAUD_RATE: u32 = 115_200;

/// Watchdog duration for a stalled transfer, in milliseconds.
///
/// Armed when a transfer begins and restarted on every line belonging to it.
/// Expiry is the only automatic recovery from a companion that stops
/// responding mid-transfer.
pub const WATCHDOG_MS: u32 = 5_000;

/// Capacity of the ISR-to-consumer receive ring, in bytes.
pub const RX_QUEUE_SIZE: usize = 2048;

/// Maximum length of a single reassembled line, in bytes.
///
/// A longer line is delivered truncated at this bound rather than grown
/// without limit.
pub const LINE_BUFFER_SIZE: usize = 2048;

/// Size of the in-memory chunk buffer used in binary-capture mode. Each full
/// chunk is flushed to the destination file before more bytes are accepted.
pub const FILE_CHUNK_SIZE: usize = 512;

/// Maximum framed length (command plus newline) of one outbound command.
pub const TX_BUFFER_SIZE: usize = 512;

/// Maximum number of header entries in a typed header map.
pub const MAX_HEADERS: usize = 8;

/// Maximum length of a destination file path.
pub const MAX_PATH_LEN: usize = 128;

/// Capacity of the accumulated text response and of the last-response line.
pub const RESPONSE_BUFFER_SIZE: usize = 2048;

/// HTTP verbs the companion executes on the device's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
}

impl Verb {
    /// Wire name of the verb as it appears inside markers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    /// The `[<VERB>/SUCCESS]` marker that opens a transfer for this verb.
    pub fn success_marker(&self) -> &'static str {
        match self {
            Verb::Get => "[GET/SUCCESS]",
            Verb::Post => "[POST/SUCCESS]",
            Verb::Put => "[PUT/SUCCESS]",
            Verb::Delete => "[DELETE/SUCCESS]",
        }
    }

    /// The `[<VERB>/END]` marker that closes a transfer for this verb.
    pub fn end_marker(&self) -> &'static str {
        match self {
            Verb::Get => "[GET/END]",
            Verb::Post => "[POST/END]",
            Verb::Put => "[PUT/END]",
            Verb::Delete => "[DELETE/END]",
        }
    }
}

/// Classification of one inbound line.
///
/// Markers are matched as substrings anywhere in the line, mirroring the
/// companion firmware which may prefix them with free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `[PONG]` — liveness reply; confirms the link when inactive.
    Pong,
    /// `[SUCCESS]` or `[CONNECTED]` — an operation succeeded.
    Success,
    /// `[INFO]` — informational text from the companion.
    Info,
    /// `[ERROR]` — the companion reports a failure.
    ErrorReport,
    /// `[DISCONNECTED]` — WiFi was disconnected.
    Disconnected,
    /// `[<VERB>/SUCCESS]` — a response stream for the verb begins.
    VerbSuccess(Verb),
    /// `[<VERB>/END]` — the response stream for the verb is complete.
    VerbEnd(Verb),
    /// Anything else: response-body content or noise.
    Other,
}

const VERBS: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

/// Classify one reassembled line.
///
/// Verb markers are checked before the bare markers so that a line such as
/// `[GET/SUCCESS]` is never misread. `[SUCCESS]` does not occur as a
/// substring of any verb marker, but keeping the verb checks first makes the
/// priority explicit.
pub fn classify(line: &str) -> Marker {
    for verb in VERBS {
        if line.contains(verb.end_marker()) {
            return Marker::VerbEnd(verb);
        }
        if line.contains(verb.success_marker()) {
            return Marker::VerbSuccess(verb);
        }
    }
    if line.contains("[PONG]") {
        Marker::Pong
    } else if line.contains("[ERROR]") {
        Marker::ErrorReport
    } else if line.contains("[SUCCESS]") || line.contains("[CONNECTED]") {
        Marker::Success
    } else if line.contains("[INFO]") {
        Marker::Info
    } else if line.contains("[DISCONNECTED]") {
        Marker::Disconnected
    } else {
        Marker::Other
    }
}

/// State of the serial link.
///
/// Transitions happen only in response to an explicit send, a classified
/// inbound line, or watchdog expiry. No other code path may change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No confirmed link to the companion. Only a liveness probe or a
    /// WiFi-connect command may be sent.
    Inactive,
    /// Link confirmed, no request in flight.
    Idle,
    /// A command write is in progress (transient).
    Sending,
    /// A response is being streamed in, text or binary.
    Receiving,
    /// The last operation failed or timed out. Cleared by the next inbound
    /// line from the companion.
    Issue,
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LinkState::Inactive => defmt::write!(f, "Inactive"),
            LinkState::Idle => defmt::write!(f, "Idle"),
            LinkState::Sending => defmt::write!(f, "Sending"),
            LinkState::Receiving => defmt::write!(f, "Receiving"),
            LinkState::Issue => defmt::write!(f, "Issue"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Verb {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.as_str())
    }
}
