//! Shared helpers for the seglog benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use seglog_core::{Options, Wal};

/// A deterministic payload of `len` bytes derived from `index`.
#[must_use]
pub fn payload(index: u64, len: usize) -> Vec<u8> {
    let byte = (index % 251) as u8;
    vec![byte; len]
}

/// Opens a log, appends `count` entries of `len` bytes and flushes them,
/// returning the log ready for read benchmarks.
pub fn populated_wal(dir: &std::path::Path, count: u64, len: usize) -> Wal {
    let wal = Wal::open(dir, Options::default()).expect("open bench log");
    for index in 1..=count {
        wal.write(index, &payload(index, len)).expect("append entry");
    }
    wal.flush_and_sync().expect("flush entries");
    wal
}
