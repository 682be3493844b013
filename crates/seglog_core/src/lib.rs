//! # seglog core
//!
//! An embedded, append-only, segmented write-ahead log for durable,
//! ordered storage of variable-length byte payloads.
//!
//! Entries are addressed by a caller-supplied, monotonically increasing
//! 64-bit index. The log is stored as paired data and index files per
//! segment; appends are buffered in memory, random reads go through a
//! memory-mapped index, and head/tail trims commit with an atomic rename
//! so every intermediate crash state is recoverable at the next open.
//!
//! ## Usage
//!
//! ```no_run
//! use seglog_core::{Options, Wal};
//!
//! # fn main() -> seglog_core::WalResult<()> {
//! let wal = Wal::open("/tmp/mylog", Options::default())?;
//! wal.write(1, b"hello")?;
//! wal.flush_and_sync()?;
//! assert_eq!(wal.read(1)?, b"hello");
//! wal.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! A single process owns a log directory; a second open of the same
//! directory fails with [`WalError::Locked`].

#![warn(missing_docs)]

mod error;
pub mod naming;
mod options;
mod segment;
mod wal;

pub use error::{WalError, WalResult};
pub use options::{
    Options, DEFAULT_BASE, DEFAULT_ENCODE_BUFFER_SIZE, DEFAULT_INDEX_SUFFIX, DEFAULT_LOG_SUFFIX,
    DEFAULT_SEGMENT_ENTRIES, DEFAULT_SEGMENT_SIZE, DEFAULT_WRITE_BUFFER_SIZE,
};
pub use wal::Wal;
