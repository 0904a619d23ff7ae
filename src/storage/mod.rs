//! Storage sink abstraction for persisted response data.
//!
//! The link persists response bodies in flushes of at most one chunk
//! ([`crate::protocol::FILE_CHUNK_SIZE`] bytes in binary-capture mode, one
//! line in text mode). Each flush is a complete open-write-close cycle on the
//! destination file: no handle is held across flushes, so partial data is
//! durable the moment a flush returns and a crash mid-transfer loses at most
//! the unflushed remainder.

/// A sink that appends response data to a named destination.
pub trait StorageSink {
    /// Associated error type.
    type Error: core::fmt::Debug;

    /// Append `data` to the file at `path`, creating or truncating it first
    /// when `truncate` is set.
    ///
    /// The implementation opens the file, writes the whole buffer, and closes
    /// the file before returning. `truncate` is set only on the very first
    /// flush of a transfer.
    fn append(&mut self, path: &str, data: &[u8], truncate: bool) -> Result<(), Self::Error>;
}
