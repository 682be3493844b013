//! # seglog testkit
//!
//! Test utilities for the seglog write-ahead log.
//!
//! This crate provides:
//! - Log fixtures with automatic cleanup
//! - Crash-state builders that fabricate on-disk states a crashed
//!   process could leave behind (torn tails, residual sidecars, stale
//!   scratch files)
//! - Property-based test generators using proptest
//! - Cross-module integration tests
//!
//! ## Usage
//!
//! ```
//! use seglog_testkit::with_temp_wal;
//!
//! with_temp_wal(|wal| {
//!     wal.write(1, b"hello").unwrap();
//!     wal.flush().unwrap();
//!     assert_eq!(wal.read(1).unwrap(), b"hello");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;

pub use crash::*;
pub use fixtures::*;
pub use generators::*;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}
