//! Synchronous request helper.
//!
//! Wraps the send / poll / parse cycle into one blocking call for callers
//! that do not want to drive the state machine themselves. The helper pumps
//! the receive ring on every poll, so it works with or without a dedicated
//! consumer task.

use crate::error::{RequestError, SendError};
use crate::link::Connection;
use crate::protocol::LinkState;
use crate::storage::StorageSink;
use crate::transport::{Delay, SerialPort, Watchdog};

/// Poll period between state checks.
pub const POLL_INTERVAL_MS: u32 = 100;

/// Issue one request and block until it resolves.
///
/// `send` issues the command (typically one of the [`Connection`] builders);
/// `parse` turns the settled connection into the caller's result, returning
/// `None` when the response is unusable. The watchdog is armed immediately
/// after the send, so a companion that never answers at all still resolves
/// as [`RequestError::Timeout`] rather than hanging forever.
///
/// Resolution, in order: a send rejection maps to
/// [`RequestError::SendFailed`]; watchdog expiry to [`RequestError::Timeout`];
/// an `[ERROR]` line or sink failure to [`RequestError::Issue`]; and a
/// `parse` returning `None` to [`RequestError::ParseFailed`].
pub fn request_and_parse<'q, P, S, W, D, T>(
    conn: &mut Connection<'q, P, S, W>,
    delay: &mut D,
    send: impl FnOnce(&mut Connection<'q, P, S, W>) -> Result<(), SendError>,
    parse: impl FnOnce(&Connection<'q, P, S, W>) -> Option<T>,
) -> Result<T, RequestError>
where
    P: SerialPort,
    S: StorageSink,
    W: Watchdog,
    D: Delay,
{
    send(conn).map_err(RequestError::SendFailed)?;
    conn.begin_receive();
    loop {
        conn.pump();
        if conn.state() != LinkState::Receiving {
            break;
        }
        if !conn.watchdog_running() {
            break;
        }
        delay.delay_ms(POLL_INTERVAL_MS);
    }
    conn.stop_watchdog();
    if conn.state() == LinkState::Issue {
        if conn.timed_out() {
            return Err(RequestError::Timeout);
        }
        return Err(RequestError::Issue);
    }
    parse(conn).ok_or(RequestError::ParseFailed)
}
