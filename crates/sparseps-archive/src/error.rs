//! Error types for archive reads.

use thiserror::Error;

/// Errors that can occur while decoding an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A read would run past the written length of the buffer.
    #[error("read past end of archive: need {requested} bytes, {remaining} remain")]
    ReadPastEnd {
        /// Bytes the read needed.
        requested: usize,
        /// Bytes left between the cursor and the write high-watermark.
        remaining: usize,
    },

    /// A length prefix is too large to be plausible for the remaining bytes.
    #[error("implausible length prefix {len} with only {remaining} bytes remaining")]
    BadLengthPrefix {
        /// Decoded element count.
        len: u64,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A string field did not contain valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
