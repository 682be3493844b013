//! The write-ahead log engine.
//!
//! A [`Wal`] owns one directory of segment files and exposes an ordered,
//! gap-free sequence of entries addressed by a monotonically increasing
//! 64-bit index. Appends go through an in-memory write buffer and become
//! readable once flushed; `clean` and `truncate` trim the head and tail
//! of the sequence using a copy-then-rename protocol whose rename is the
//! commit point, so a crash at any step is reconciled by the next open.
//!
//! ## Directory layout
//!
//! ```text
//! <dir>/
//! ├─ LOCK                      # advisory single-process lock
//! ├─ <offset>.log              # segment data, offset in base `base`
//! ├─ <offset>.idx              # segment index (rebuilt caches)
//! ├─ <offset>.log.clean        # head-trim sidecar, transient
//! ├─ <offset>.log.trunc        # tail-trim sidecar, transient
//! └─ wal.tmp                   # scratch copy target, transient
//! ```
//!
//! ## Concurrency
//!
//! All state sits behind a single mutex; every public operation locks on
//! entry and unlocks on return. File I/O, fsync and mmap calls run under
//! the lock, which suits the intended workload of one writer and
//! occasional readers. The split-free `clean` mode detaches segments from
//! the list and removes them on a background thread; those threads are
//! joined by `close` and `reset` so no handles outlive the log.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use fs2::FileExt;
use memmap2::{Mmap, MmapMut};
use parking_lot::Mutex;
use seglog_codec::{decode_varint, encode_varint, U64_LEN};
use tracing::{debug, info, warn};

use crate::error::{WalError, WalResult};
use crate::naming::{FileKind, Naming, LOCK_FILE, SCRATCH_FILE};
use crate::options::Options;
use crate::segment::Segment;

/// An embedded, segmented, crash-safe write-ahead log.
///
/// Entries are appended in strict index order with [`Wal::write`], become
/// readable after [`Wal::flush`], and are durable once the data file is
/// synced ([`Wal::sync`] or [`Wal::flush_and_sync`]). The log can be
/// trimmed from the head with [`Wal::clean`] and from the tail with
/// [`Wal::truncate`]; both survive a crash at any intermediate step.
///
/// All operations serialize on one internal mutex and perform blocking
/// file I/O while holding it.
pub struct Wal {
    inner: Mutex<Inner>,
}

struct Inner {
    dir: PathBuf,
    naming: Naming,
    segment_size: u64,
    segment_entries: u64,
    index_space: u64,
    no_split_segment: bool,
    closed: bool,
    first_index: u64,
    last_index: u64,
    segments: Vec<Segment>,
    encode_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    removals: Vec<JoinHandle<()>>,
    _lock_file: File,
}

impl Wal {
    /// Opens or creates a log directory.
    ///
    /// Recovery runs here: stale scratch files are deleted, sidecars left
    /// by an interrupted `clean`/`truncate` are promoted, segments they
    /// superseded are removed, and the tail segment's index is rebuilt
    /// from its data file, dropping any torn trailing entry.
    ///
    /// # Errors
    ///
    /// [`WalError::Base`] when the configured base is outside `[2, 36]`,
    /// [`WalError::Locked`] when another process owns the directory, and
    /// any underlying I/O error.
    pub fn open(path: impl AsRef<Path>, options: Options) -> WalResult<Self> {
        let options = options.validated()?;
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(WalError::Locked);
        }

        let naming = Naming::new(options.base, &options.log_suffix, &options.index_suffix);
        let index_space = (options.segment_entries + 1) * U64_LEN as u64;
        let mut inner = Inner {
            dir,
            naming,
            segment_size: options.segment_size,
            segment_entries: options.segment_entries,
            index_space,
            no_split_segment: options.no_split_segment,
            closed: false,
            first_index: 1,
            last_index: 0,
            segments: Vec::new(),
            encode_buffer: Vec::with_capacity(options.encode_buffer_size),
            write_buffer: Vec::with_capacity(options.write_buffer_size),
            removals: Vec::new(),
            _lock_file: lock_file,
        };
        inner.load()?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Appends an entry. `index` must be `last_index + 1`, except on an
    /// empty log where any nonzero index starts the sequence.
    ///
    /// The entry lands in the write buffer; it is not readable until a
    /// flush and not durable until a sync.
    pub fn write(&self, index: u64, data: &[u8]) -> WalResult<()> {
        self.inner.lock().write(index, data)
    }

    /// Returns the payload stored at `index`.
    pub fn read(&self, index: u64) -> WalResult<Vec<u8>> {
        self.inner.lock().read(index)
    }

    /// Drains the write buffer to the tail data file. No fsync.
    pub fn flush(&self) -> WalResult<()> {
        self.inner.lock().flush()
    }

    /// Fsyncs the tail data file. Does not touch the write buffer.
    pub fn sync(&self) -> WalResult<()> {
        self.inner.lock().sync()
    }

    /// [`Wal::flush`] followed by [`Wal::sync`] under one lock.
    pub fn flush_and_sync(&self) -> WalResult<()> {
        let mut inner = self.inner.lock();
        inner.flush()?;
        inner.sync()
    }

    /// Index of the oldest entry, or 1 when the log is empty.
    pub fn first_index(&self) -> WalResult<u64> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(WalError::Closed);
        }
        Ok(inner.first_index)
    }

    /// Index of the newest entry, or 0 when the log is empty.
    pub fn last_index(&self) -> WalResult<u64> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(WalError::Closed);
        }
        Ok(inner.last_index)
    }

    /// True when `index` is within `[first_index, last_index]`.
    pub fn is_exist(&self, index: u64) -> WalResult<bool> {
        let inner = self.inner.lock();
        match inner.check_index(index) {
            Ok(()) => Ok(true),
            Err(WalError::Closed) => Err(WalError::Closed),
            Err(_) => Ok(false),
        }
    }

    /// Discards every entry with index strictly less than `index`, after
    /// which `first_index == index`. A no-op when `index` is already the
    /// first index.
    pub fn clean(&self, index: u64) -> WalResult<()> {
        self.inner.lock().clean(index)
    }

    /// Discards every entry with index strictly greater than `index`,
    /// after which `last_index == index`. A no-op when `index` is already
    /// the last index.
    pub fn truncate(&self, index: u64) -> WalResult<()> {
        self.inner.lock().truncate(index)
    }

    /// Discards all entries and segment files, returning the log to its
    /// empty state. The log stays open and usable.
    pub fn reset(&self) -> WalResult<()> {
        self.inner.lock().reset()
    }

    /// Flushes, syncs and closes the log. Every later operation,
    /// including a second `close`, fails with [`WalError::Closed`].
    pub fn close(&self) -> WalResult<()> {
        self.inner.lock().close()
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal").finish_non_exhaustive()
    }
}

impl Inner {
    /// Directory walk at open time. Names are processed in ascending
    /// order; for fixed-width names that equals ascending offset order.
    fn load(&mut self) -> WalResult<()> {
        let scratch = self.dir.join(SCRATCH_FILE);
        if scratch.exists() {
            debug!(path = %scratch.display(), "removing stale scratch file");
            fs::remove_file(&scratch)?;
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();

        let mut truncating = false;
        for name in names {
            match self.naming.classify(&name) {
                Some(FileKind::Log(offset)) => {
                    if truncating {
                        // A later .trunc sidecar superseded this tail.
                        warn!(name = %name, "removing segment superseded by truncation");
                        fs::remove_file(self.dir.join(&name))?;
                        let _ = fs::remove_file(self.dir.join(self.naming.index_name(offset)));
                        continue;
                    }
                    self.push_segment_record(offset);
                }
                Some(FileKind::Clean(offset)) => {
                    // The sidecar holds everything that survives the head
                    // trim; segments accumulated so far are obsolete.
                    debug!(name = %name, "promoting clean sidecar");
                    for segment in &mut self.segments {
                        segment.remove()?;
                    }
                    self.segments.clear();
                    fs::rename(
                        self.dir.join(&name),
                        self.dir.join(self.naming.log_name(offset)),
                    )?;
                    self.push_segment_record(offset);
                }
                Some(FileKind::Trunc(offset)) => {
                    debug!(name = %name, "promoting trunc sidecar");
                    truncating = true;
                    if self.segments.last().is_some_and(|s| s.offset == offset) {
                        let mut dirty = self.segments.pop().expect("list is non-empty");
                        dirty.remove()?;
                    }
                    fs::rename(
                        self.dir.join(&name),
                        self.dir.join(self.naming.log_name(offset)),
                    )?;
                    self.push_segment_record(offset);
                }
                None => {}
            }
        }

        if self.segments.is_empty() {
            info!(dir = %self.dir.display(), "opened empty log");
            return Ok(());
        }
        self.first_index = self.segments[0].offset + 1;
        self.reset_tail()?;
        info!(
            dir = %self.dir.display(),
            segments = self.segments.len(),
            first_index = self.first_index,
            last_index = self.last_index,
            "opened log"
        );
        Ok(())
    }

    fn push_segment_record(&mut self, offset: u64) {
        let log_path = self.dir.join(self.naming.log_name(offset));
        let index_path = self.dir.join(self.naming.index_name(offset));
        self.segments
            .push(Segment::new(offset, log_path, index_path, self.index_space));
    }

    /// Reopens the last segment read/write and recomputes `last_index`
    /// from it, rebuilding its index when the data file disagrees.
    fn reset_tail(&mut self) -> WalResult<()> {
        let tail = self
            .segments
            .last_mut()
            .expect("reset_tail requires a tail segment");
        tail.close()?;
        tail.open_writable()?;
        if tail.data_len()? == 0 {
            self.last_index = tail.offset;
            return Ok(());
        }
        tail.load()?;
        self.last_index = tail.offset + tail.len;
        Ok(())
    }

    /// Seals the current tail and starts a fresh segment pair named
    /// after `last_index`.
    fn append_segment(&mut self) -> WalResult<()> {
        if let Some(tail) = self.segments.last_mut() {
            tail.close()?;
        }
        let offset = self.last_index;
        debug!(offset, "starting new segment");
        let log_path = self.dir.join(self.naming.log_name(offset));
        let index_path = self.dir.join(self.naming.index_name(offset));
        let mut segment = Segment::new(offset, log_path, index_path, self.index_space);
        segment.create()?;
        sync_dir(&self.dir)?;
        self.segments.push(segment);
        Ok(())
    }

    fn write(&mut self, index: u64, data: &[u8]) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if index == 0 {
            return Err(WalError::ZeroIndex);
        }
        if self.last_index > 0 && index != self.last_index + 1 {
            return Err(WalError::OutOfOrder);
        }
        if self.last_index == 0 {
            // First entry of an empty log fixes the baseline.
            self.first_index = index;
            self.last_index = index - 1;
        }
        if self.segments.is_empty() {
            self.append_segment()?;
        }

        self.encode_buffer.clear();
        encode_varint(&mut self.encode_buffer, data.len() as u64);
        self.encode_buffer.extend_from_slice(data);
        let entry_len = self.encode_buffer.len() as u64;

        let (tail_offset, mut end) = {
            let tail = self
                .segments
                .last()
                .expect("tail segment exists after append_segment");
            (tail.offset, tail.data_len()?)
        };
        // Roll over when the entry no longer fits or the segment is at
        // its entry cap. An oversized entry landing in an empty segment
        // stays there; rolling would recreate the same segment.
        let pending = self.write_buffer.len() as u64;
        if (end + pending + entry_len > self.segment_size && index - tail_offset > 1)
            || index - tail_offset > self.segment_entries
        {
            self.flush()?;
            self.sync()?;
            self.append_segment()?;
            end = 0;
        }

        // The index mmap is advanced before the bytes hit the data file.
        // Safe because the entry only becomes readable once a flush puts
        // the bytes where slot(len) already says they are.
        let pending = self.write_buffer.len() as u64;
        let tail = self.segments.last_mut().expect("tail segment exists");
        let entries = index - tail.offset;
        tail.set_slot(0, entries);
        tail.set_slot(entries, end + pending + entry_len);
        tail.len = entries;
        self.write_buffer.extend_from_slice(&self.encode_buffer);
        self.last_index = index;
        Ok(())
    }

    fn flush(&mut self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        let tail = self
            .segments
            .last_mut()
            .expect("pending writes imply a tail segment");
        tail.append_data(&self.write_buffer)?;
        self.write_buffer.clear();
        Ok(())
    }

    fn sync(&mut self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if let Some(tail) = self.segments.last() {
            tail.sync_data()?;
        }
        Ok(())
    }

    fn check_index(&self, index: u64) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if index == 0
            || self.last_index == 0
            || index < self.first_index
            || index > self.last_index
        {
            return Err(WalError::OutOfRange);
        }
        Ok(())
    }

    /// Largest `i` with `segments[i].offset < index`. Only called after
    /// `check_index`, which guarantees a hit.
    fn search_segment(&self, index: u64) -> usize {
        self.segments.partition_point(|s| s.offset < index) - 1
    }

    fn read(&mut self, index: u64) -> WalResult<Vec<u8>> {
        self.check_index(index)?;
        let at = self.search_segment(index);
        let segment = &mut self.segments[at];
        if segment.len == 0 {
            segment.load()?;
        }
        let (start, end) = segment.read_range(index);
        let mut entry = segment.read_entry(start, (end - start) as usize)?;
        let (size, header_len) =
            decode_varint(&entry).map_err(|_| WalError::UnexpectedSize)?;
        if (entry.len() - header_len) as u64 != size {
            return Err(WalError::UnexpectedSize);
        }
        Ok(entry.split_off(header_len))
    }

    fn clean(&mut self, index: u64) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if index == self.first_index {
            return Ok(());
        }
        self.check_index(index)?;
        let at = self.search_segment(index);
        if self.segments[at].len == 0 {
            self.segments[at].load()?;
        }

        // Fast path: the trim lands on a segment boundary.
        if self.segments[at].offset == index - 1 {
            for segment in &mut self.segments[..at] {
                segment.close()?;
                segment.remove()?;
            }
            self.segments.drain(..at);
            self.first_index = index;
            debug!(index, "cleaned on segment boundary");
            return Ok(());
        }

        if self.no_split_segment {
            // Keep the whole segment containing `index`; drop only the
            // segments before it, removing their files off-thread.
            if at > 0 {
                let detached: Vec<Segment> = self.segments.drain(..at).collect();
                self.first_index = self.segments[0].offset + 1;
                debug!(
                    index,
                    removed = detached.len(),
                    first_index = self.first_index,
                    "cleaned whole segments without splitting"
                );
                self.removals.push(std::thread::spawn(move || {
                    for mut segment in detached {
                        let _ = segment.close();
                        let _ = segment.remove();
                    }
                }));
            }
            return Ok(());
        }

        // Split: copy the surviving byte range into a sidecar, remove the
        // obsolete segments, then promote the sidecar. The promotion
        // rename is the commit point.
        if at == self.segments.len() - 1 {
            self.flush()?;
        }
        let (src, start, end) = {
            let segment = &self.segments[at];
            let (start, _) = segment.read_range(index);
            let (_, end) = segment.read_range(segment.offset + segment.len);
            (segment.log_path.clone(), start, end)
        };
        let sidecar = self.dir.join(self.naming.clean_name(index - 1));
        self.copy_range(&src, &sidecar, start, end - start)?;
        for segment in &mut self.segments[..=at] {
            segment.close()?;
            segment.remove()?;
        }
        let canonical = self.dir.join(self.naming.log_name(index - 1));
        fs::rename(&sidecar, &canonical)?;
        sync_dir(&self.dir)?;

        let index_path = self.dir.join(self.naming.index_name(index - 1));
        {
            // Reuse the in-memory record for the promoted file; its index
            // is rebuilt from the copied data on the next load.
            let segment = &mut self.segments[at];
            segment.log_path = canonical;
            segment.index_path = index_path;
            segment.offset = index - 1;
            segment.len = 0;
        }
        self.segments.drain(..at);
        self.first_index = index;
        debug!(index, "cleaned with segment split");
        if self.segments.len() == 1 {
            self.reset_tail()?;
        }
        Ok(())
    }

    fn truncate(&mut self, index: u64) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        if index == self.last_index {
            return Ok(());
        }
        self.check_index(index)?;
        // Buffered bytes belong to the tail, which the trim is about to
        // rewrite or drop; land them first so the data files contain
        // every byte the index mmaps point at.
        self.flush()?;
        let at = self.search_segment(index);
        if self.segments[at].len == 0 {
            self.segments[at].load()?;
        }

        // Fast path: the trim lands exactly between two segments.
        if self.segments.get(at + 1).is_some_and(|s| s.offset == index) {
            for segment in &mut self.segments[at + 1..] {
                segment.close()?;
                segment.remove()?;
            }
            self.segments.truncate(at + 1);
            self.last_index = index;
            debug!(index, "truncated on segment boundary");
            return self.reset_tail();
        }

        let (src, keep_offset, end) = {
            let segment = &self.segments[at];
            let (_, end) = segment.read_range(index);
            (segment.log_path.clone(), segment.offset, end)
        };
        let sidecar = self.dir.join(self.naming.trunc_name(keep_offset));
        self.copy_range(&src, &sidecar, 0, end)?;
        for segment in &mut self.segments[at..] {
            segment.close()?;
            segment.remove()?;
        }
        let canonical = self.dir.join(self.naming.log_name(keep_offset));
        fs::rename(&sidecar, &canonical)?;
        sync_dir(&self.dir)?;
        self.segments.truncate(at + 1);
        self.segments[at].log_path = canonical;
        self.last_index = index;
        debug!(index, "truncated with segment split");
        self.reset_tail()
    }

    fn reset(&mut self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        for segment in &mut self.segments {
            segment.close()?;
        }
        self.join_removals();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if self.naming.is_owned_file(&name) {
                fs::remove_file(entry.path())?;
            }
        }
        sync_dir(&self.dir)?;
        self.segments.clear();
        self.write_buffer.clear();
        self.first_index = 1;
        self.last_index = 0;
        info!(dir = %self.dir.display(), "log reset");
        Ok(())
    }

    fn close(&mut self) -> WalResult<()> {
        self.flush()?;
        self.sync()?;
        self.closed = true;
        for segment in &mut self.segments {
            segment.close()?;
        }
        self.join_removals();
        Ok(())
    }

    fn join_removals(&mut self) {
        for handle in self.removals.drain(..) {
            let _ = handle.join();
        }
    }

    /// Copies `size` bytes at `offset` from `src` into the scratch file,
    /// syncs it, and renames it to `dst`.
    fn copy_range(&self, src: &Path, dst: &Path, offset: u64, size: u64) -> WalResult<()> {
        let src_file = File::open(src)?;
        // SAFETY: read-only map of a file this process owns exclusively.
        let src_map = unsafe { Mmap::map(&src_file)? };
        let scratch_path = self.dir.join(SCRATCH_FILE);
        let scratch = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&scratch_path)?;
        scratch.set_len(size)?;
        scratch.sync_all()?;
        // SAFETY: just sized, and nothing else maps the scratch file.
        let mut scratch_map = unsafe { MmapMut::map_mut(&scratch)? };
        let (offset, size) = (offset as usize, size as usize);
        scratch_map.copy_from_slice(&src_map[offset..offset + size]);
        scratch_map.flush()?;
        drop(scratch_map);
        scratch.sync_all()?;
        drop(scratch);
        fs::rename(&scratch_path, dst)?;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> WalResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> WalResult<()> {
    Ok(())
}
