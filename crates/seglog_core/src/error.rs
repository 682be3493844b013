//! Error types for the log engine.

use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur while operating on a write-ahead log.
#[derive(Debug, Error)]
pub enum WalError {
    /// Operation attempted after [`Wal::close`](crate::Wal::close).
    #[error("log is closed")]
    Closed,

    /// Index 0 supplied where a nonzero index is required.
    #[error("index can not be zero")]
    ZeroIndex,

    /// Write index is not `last_index + 1`.
    #[error("index out of order, expected last_index + 1")]
    OutOfOrder,

    /// Index falls outside `[first_index, last_index]`.
    #[error("index out of range")]
    OutOfRange,

    /// On-disk entry length disagrees with its varint header.
    #[error("unexpected entry size")]
    UnexpectedSize,

    /// Segment name base outside `[2, 36]`.
    #[error("base must satisfy 2 <= base <= 36")]
    Base,

    /// Another process holds the log directory lock.
    #[error("log directory is locked by another process")]
    Locked,

    /// Underlying filesystem or mmap error, returned verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Entry framing could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] seglog_codec::CodecError),
}

impl WalError {
    /// Returns true when the error is the out-of-range kind.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange)
    }

    /// Returns true when the error is the closed kind.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
