//! Test fixtures and log helpers.
//!
//! Provides convenience wrappers for setting up temporary logs and the
//! payload shapes shared across the test suites.

use seglog_core::{Options, Wal};
use std::path::Path;
use tempfile::TempDir;

/// A log in a temporary directory with automatic cleanup.
pub struct TestWal {
    /// The open log.
    pub wal: Wal,
    /// Keeps the directory alive for the lifetime of the fixture.
    temp_dir: TempDir,
}

impl TestWal {
    /// Creates a log with default options.
    pub fn create() -> Self {
        Self::with_options(Options::default())
    }

    /// Creates a log with the given options.
    pub fn with_options(options: Options) -> Self {
        let temp_dir = TempDir::new().expect("create temp directory");
        let wal = Wal::open(temp_dir.path(), options).expect("open log");
        Self { wal, temp_dir }
    }

    /// Returns the log directory path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the log and reopens it from the same directory, simulating
    /// a clean process restart.
    pub fn reopen(self, options: Options) -> Self {
        let Self { wal, temp_dir } = self;
        let _ = wal.close();
        drop(wal);
        let wal = Wal::open(temp_dir.path(), options).expect("reopen log");
        Self { wal, temp_dir }
    }

    /// Drops the log without closing it, keeping the directory, and
    /// reopens. Unflushed entries are lost, like a crash would lose them.
    pub fn crash_and_reopen(self, options: Options) -> Self {
        let Self { wal, temp_dir } = self;
        drop(wal);
        let wal = Wal::open(temp_dir.path(), options).expect("reopen log after crash");
        Self { wal, temp_dir }
    }
}

impl std::ops::Deref for TestWal {
    type Target = Wal;

    fn deref(&self) -> &Self::Target {
        &self.wal
    }
}

/// Runs a test against a temporary log with default options.
pub fn with_temp_wal<F, R>(f: F) -> R
where
    F: FnOnce(&Wal) -> R,
{
    let fixture = TestWal::create();
    f(&fixture.wal)
}

/// Runs a test against a temporary log with the given options.
pub fn with_wal_options<F, R>(options: Options, f: F) -> R
where
    F: FnOnce(&Wal) -> R,
{
    let fixture = TestWal::with_options(options);
    f(&fixture.wal)
}

/// Options with a small per-segment entry cap, for tests that need
/// several segments without writing much data.
pub fn small_segment_options(entries: u64) -> Options {
    Options::new().segment_entries(entries)
}

/// A recognizable payload for entry `index`: two zero bytes followed by
/// the low byte of the index.
pub fn indexed_payload(index: u64) -> Vec<u8> {
    vec![0, 0, index as u8]
}

/// Writes `indexed_payload` entries for `range` and flushes them.
pub fn fill(wal: &Wal, range: std::ops::RangeInclusive<u64>) {
    for index in range {
        wal.write(index, &indexed_payload(index)).expect("write entry");
    }
    wal.flush_and_sync().expect("flush entries");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_round_trip() {
        let fixture = TestWal::create();
        fill(&fixture, 1..=5);
        assert_eq!(fixture.read(3).unwrap(), indexed_payload(3));
    }

    #[test]
    fn reopen_keeps_contents() {
        let mut fixture = TestWal::with_options(small_segment_options(2));
        fill(&fixture, 1..=5);
        fixture = fixture.reopen(small_segment_options(2));
        assert_eq!(fixture.first_index().unwrap(), 1);
        assert_eq!(fixture.last_index().unwrap(), 5);
        assert_eq!(fixture.read(5).unwrap(), indexed_payload(5));
    }

    #[test]
    fn with_temp_wal_runs_closure() {
        let last = with_temp_wal(|wal| {
            fill(wal, 1..=3);
            wal.last_index().unwrap()
        });
        assert_eq!(last, 3);
    }
}
