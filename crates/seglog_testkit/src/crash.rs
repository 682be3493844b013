//! Crash-state builders and recovery tests.
//!
//! A crashed process can leave a log directory in a handful of partial
//! states: a torn entry at the end of a data file, a `.clean` or
//! `.trunc` sidecar that was renamed but whose surrounding deletions
//! never ran, or a stale scratch file. The builders here fabricate those
//! states byte for byte so the recovery scanner can be exercised against
//! each of them.
//!
//! ## Usage
//!
//! ```
//! use seglog_core::{Options, Wal};
//! use seglog_testkit::crash;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! crash::seed_segment(dir.path(), 10, 0, &[b"one", b"two"]);
//! crash::append_garbage(dir.path(), 10, 0, &[7, 1]);
//!
//! let wal = Wal::open(dir.path(), Options::default()).unwrap();
//! assert_eq!(wal.last_index().unwrap(), 2);
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use seglog_codec::encode_varint;
use seglog_core::naming::{segment_name, CLEAN_SUFFIX, SCRATCH_FILE, TRUNC_SUFFIX};
use seglog_core::DEFAULT_LOG_SUFFIX;

/// Encodes payloads the way the append path does: `varint(len) ‖ bytes`
/// per entry, concatenated.
pub fn encode_entries(payloads: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        encode_varint(&mut out, payload.len() as u64);
        out.extend_from_slice(payload);
    }
    out
}

fn log_file_name(base: u32, offset: u64) -> String {
    format!("{}{}", segment_name(offset, base), DEFAULT_LOG_SUFFIX)
}

/// Writes a canonical segment data file holding `payloads`, covering
/// indices `offset+1 ..= offset+payloads.len()`. No index file; the
/// engine rebuilds one on demand.
pub fn seed_segment(dir: &Path, base: u32, offset: u64, payloads: &[&[u8]]) {
    fs::write(dir.join(log_file_name(base, offset)), encode_entries(payloads))
        .expect("seed segment file");
}

/// Writes a `.clean` sidecar as an interrupted head trim would leave it.
pub fn seed_clean_sidecar(dir: &Path, base: u32, offset: u64, payloads: &[&[u8]]) {
    let name = format!("{}{}", log_file_name(base, offset), CLEAN_SUFFIX);
    fs::write(dir.join(name), encode_entries(payloads)).expect("seed clean sidecar");
}

/// Writes a `.trunc` sidecar as an interrupted tail trim would leave it.
pub fn seed_trunc_sidecar(dir: &Path, base: u32, offset: u64, payloads: &[&[u8]]) {
    let name = format!("{}{}", log_file_name(base, offset), TRUNC_SUFFIX);
    fs::write(dir.join(name), encode_entries(payloads)).expect("seed trunc sidecar");
}

/// Appends raw bytes to an existing segment data file, emulating a write
/// that was cut short mid-entry.
pub fn append_garbage(dir: &Path, base: u32, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.join(log_file_name(base, offset)))
        .expect("open segment file for garbage append");
    file.write_all(bytes).expect("append garbage bytes");
}

/// Drops a stale scratch file into the directory.
pub fn seed_scratch(dir: &Path) {
    fs::write(dir.join(SCRATCH_FILE), b"interrupted copy").expect("seed scratch file");
}
