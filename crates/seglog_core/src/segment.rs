//! A segment: one data file plus one index file.
//!
//! A segment owns the entries with indices `(offset, offset + len]`. The
//! data file is a raw concatenation of `varint(len) ‖ payload` records.
//! The index file is a fixed-size table of 8-byte little-endian slots,
//! memory-mapped read/write:
//!
//! ```text
//! slot 0              entry count (len)
//! slot i, 1 <= i <= len   byte offset one past entry i in the data file
//! slot len+1 ..           unused residue
//! ```
//!
//! Entry `i` therefore occupies `[slot(i-1), slot(i))` with `slot(0)`
//! read as 0. Appends touch exactly two slots and are never msync'd; the
//! table is rebuilt from the data file whenever it disagrees with the
//! data file's length, which also covers a crash mid-write.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::PathBuf;

use memmap2::{Mmap, MmapMut};
use seglog_codec::{decode_varint, get_u64_le, put_u64_le, U64_LEN};
use tracing::warn;

use crate::error::{WalError, WalResult};

#[derive(Debug)]
pub(crate) struct Segment {
    /// Index immediately before the first entry this segment owns.
    pub(crate) offset: u64,
    /// Number of entries currently in the segment.
    pub(crate) len: u64,
    pub(crate) log_path: PathBuf,
    pub(crate) index_path: PathBuf,
    /// Fixed byte size of the index file, `(segment_entries + 1) * 8`.
    index_space: u64,
    /// True for the tail segment, whose data file is open read/write.
    writable: bool,
    log_file: Option<File>,
    index_file: Option<File>,
    index_mmap: Option<MmapMut>,
}

impl Segment {
    pub(crate) fn new(
        offset: u64,
        log_path: PathBuf,
        index_path: PathBuf,
        index_space: u64,
    ) -> Self {
        Self {
            offset,
            len: 0,
            log_path,
            index_path,
            index_space,
            writable: false,
            log_file: None,
            index_file: None,
            index_mmap: None,
        }
    }

    /// Creates both files on disk for a fresh tail segment and maps the
    /// index. Existing files at these paths are truncated.
    pub(crate) fn create(&mut self) -> WalResult<()> {
        let log = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.log_path)?;
        let index = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.index_path)?;
        index.set_len(self.index_space)?;
        index.sync_all()?;
        // SAFETY: the file was just created and sized by this process,
        // which owns the directory exclusively for the life of the map.
        let mmap = unsafe { MmapMut::map_mut(&index)? };
        self.log_file = Some(log);
        self.index_file = Some(index);
        self.index_mmap = Some(mmap);
        self.len = 0;
        self.writable = true;
        Ok(())
    }

    /// Reopens an existing data file read/write, making this the tail.
    pub(crate) fn open_writable(&mut self) -> WalResult<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.log_path)?;
        self.log_file = Some(file);
        self.writable = true;
        Ok(())
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.index_mmap.is_some()
    }

    /// Ensures the index mmap and data file handle exist, rebuilding the
    /// index from the data file when its recorded end disagrees with the
    /// data file's length.
    ///
    /// The index file is re-created from scratch here: its on-disk content
    /// is only a cache of what the data file proves, so after a restart
    /// (or a crash) the rebuild scan is the source of truth.
    pub(crate) fn load(&mut self) -> WalResult<()> {
        if self.index_mmap.is_none() {
            let index = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.index_path)?;
            index.set_len(self.index_space)?;
            // SAFETY: sized above; the directory lock guarantees no other
            // process maps or resizes this file.
            let mmap = unsafe { MmapMut::map_mut(&index)? };
            self.index_file = Some(index);
            self.index_mmap = Some(mmap);
        }
        self.len = self.slot(0);
        let recorded_end = self.slot(self.len);
        if self.log_file.is_none() {
            self.log_file = Some(File::open(&self.log_path)?);
        }
        let data_len = self.data_len()?;
        if recorded_end != data_len {
            self.rebuild_index(data_len)?;
        }
        Ok(())
    }

    /// Scans the data file entry by entry, repopulating the index slots.
    /// Stops at the first incomplete entry; when the segment is writable
    /// the torn bytes are cut off so later appends line up with the index.
    fn rebuild_index(&mut self, data_len: u64) -> WalResult<()> {
        let max_entries = self.index_space / U64_LEN as u64 - 1;
        let mut count: u64 = 0;
        let mut position: usize = 0;
        if data_len > 0 {
            let data = {
                let file = self
                    .log_file
                    .as_ref()
                    .expect("data file is open during index rebuild");
                // SAFETY: read-only map of a file this process owns.
                unsafe { Mmap::map(file)? }
            };
            while position < data.len() && count < max_entries {
                let remaining = &data[position..];
                let Ok((size, varint_len)) = decode_varint(remaining) else {
                    break;
                };
                let Some(total) = (size as usize).checked_add(varint_len) else {
                    break;
                };
                if remaining.len() < total {
                    break;
                }
                position += total;
                count += 1;
                self.set_slot(count, position as u64);
            }
        }
        self.set_slot(0, count);
        self.len = count;

        let valid_end = position as u64;
        if valid_end < data_len && self.writable {
            warn!(
                path = %self.log_path.display(),
                valid_end,
                data_len,
                "truncating torn entry at segment tail"
            );
            let file = self
                .log_file
                .as_ref()
                .expect("data file is open during index rebuild");
            file.set_len(valid_end)?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Byte range `[start, end)` of entry `index` in the data file. The
    /// caller guarantees `index` is within `(offset, offset + len]` and
    /// that the segment is loaded.
    pub(crate) fn read_range(&self, index: u64) -> (u64, u64) {
        let rel = index - self.offset;
        let start = if rel == 1 { 0 } else { self.slot(rel - 1) };
        (start, self.slot(rel))
    }

    pub(crate) fn slot(&self, i: u64) -> u64 {
        let mmap = self
            .index_mmap
            .as_ref()
            .expect("segment index is mapped before slot reads");
        get_u64_le(&mmap[i as usize * U64_LEN..])
    }

    pub(crate) fn set_slot(&mut self, i: u64, value: u64) {
        let mmap = self
            .index_mmap
            .as_mut()
            .expect("segment index is mapped before slot writes");
        put_u64_le(&mut mmap[i as usize * U64_LEN..], value);
    }

    pub(crate) fn data_len(&self) -> WalResult<u64> {
        let file = self
            .log_file
            .as_ref()
            .expect("segment data file is open");
        Ok(file.metadata()?.len())
    }

    /// Appends raw bytes to the end of the data file. No fsync.
    pub(crate) fn append_data(&mut self, data: &[u8]) -> WalResult<()> {
        let file = self
            .log_file
            .as_mut()
            .expect("tail segment data file is open");
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        Ok(())
    }

    pub(crate) fn sync_data(&self) -> WalResult<()> {
        if let Some(file) = &self.log_file {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Reads `len` bytes starting at `start` from the data file.
    ///
    /// A short read means the index points past what was flushed, or the
    /// file was tampered with; both surface as `UnexpectedSize`.
    pub(crate) fn read_entry(&self, start: u64, len: usize) -> WalResult<Vec<u8>> {
        let file = self
            .log_file
            .as_ref()
            .expect("segment is loaded before reads");
        let mut buf = vec![0u8; len];
        if let Err(err) = read_exact_at(file, &mut buf, start) {
            if err.kind() == ErrorKind::UnexpectedEof {
                return Err(WalError::UnexpectedSize);
            }
            return Err(err.into());
        }
        Ok(buf)
    }

    /// Syncs a writable data file, closes both handles and unmaps the
    /// index. The in-memory `len` is zeroed; the on-disk slots are not.
    pub(crate) fn close(&mut self) -> WalResult<()> {
        if let Some(file) = self.log_file.take() {
            if self.writable {
                file.sync_data()?;
            }
        }
        // Unmap before dropping the index file descriptor.
        self.index_mmap = None;
        self.index_file = None;
        self.len = 0;
        self.writable = false;
        Ok(())
    }

    /// Deletes both files. The index file may already be gone when the
    /// segment was promoted from a sidecar and never loaded.
    pub(crate) fn remove(&mut self) -> WalResult<()> {
        let _ = fs::remove_file(&self.index_path);
        fs::remove_file(&self.log_path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(not(unix))]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::io::Read;
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}
