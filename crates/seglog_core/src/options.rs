//! Log configuration.

use crate::error::{WalError, WalResult};

/// Default segment data file capacity in bytes (512 MiB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 512 * 1024 * 1024;
/// Default maximum number of entries per segment (8 Mi).
pub const DEFAULT_SEGMENT_ENTRIES: u64 = 8 * 1024 * 1024;
/// Default entry encode buffer capacity (64 KiB).
pub const DEFAULT_ENCODE_BUFFER_SIZE: usize = 64 * 1024;
/// Default write buffer capacity (1 MiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024 * 1024;
/// Default data file suffix.
pub const DEFAULT_LOG_SUFFIX: &str = ".log";
/// Default index file suffix.
pub const DEFAULT_INDEX_SUFFIX: &str = ".idx";
/// Default numeric base for segment file names.
pub const DEFAULT_BASE: u32 = 10;

/// Configuration for opening a log.
///
/// Zero or empty fields fall back to their defaults during
/// [`Wal::open`](crate::Wal::open). A nonzero `base` outside `[2, 36]` is
/// rejected with [`WalError::Base`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Segment data file capacity in bytes before rollover.
    pub segment_size: u64,

    /// Maximum number of entries per segment before rollover.
    pub segment_entries: u64,

    /// Initial capacity of the entry encode buffer.
    pub encode_buffer_size: usize,

    /// Initial capacity of the write buffer.
    pub write_buffer_size: usize,

    /// Suffix of segment data files.
    pub log_suffix: String,

    /// Suffix of segment index files.
    pub index_suffix: String,

    /// Numeric base of segment file names, `2..=36`.
    pub base: u32,

    /// When set, `clean` never splits a segment: it only drops whole
    /// segments preceding the cleaned index, removing them on a
    /// background thread.
    pub no_split_segment: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            segment_entries: DEFAULT_SEGMENT_ENTRIES,
            encode_buffer_size: DEFAULT_ENCODE_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            log_suffix: DEFAULT_LOG_SUFFIX.to_string(),
            index_suffix: DEFAULT_INDEX_SUFFIX.to_string(),
            base: DEFAULT_BASE,
            no_split_segment: false,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment data file capacity.
    #[must_use]
    pub fn segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Sets the maximum number of entries per segment.
    #[must_use]
    pub fn segment_entries(mut self, entries: u64) -> Self {
        self.segment_entries = entries;
        self
    }

    /// Sets the encode buffer capacity.
    #[must_use]
    pub fn encode_buffer_size(mut self, bytes: usize) -> Self {
        self.encode_buffer_size = bytes;
        self
    }

    /// Sets the write buffer capacity.
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Sets the data file suffix.
    #[must_use]
    pub fn log_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.log_suffix = suffix.into();
        self
    }

    /// Sets the index file suffix.
    #[must_use]
    pub fn index_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.index_suffix = suffix.into();
        self
    }

    /// Sets the numeric base of segment file names.
    #[must_use]
    pub fn base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    /// Sets whether `clean` avoids splitting segments.
    #[must_use]
    pub fn no_split_segment(mut self, value: bool) -> Self {
        self.no_split_segment = value;
        self
    }

    /// Applies defaults to unset fields and validates the base.
    pub(crate) fn validated(mut self) -> WalResult<Self> {
        if self.segment_size == 0 {
            self.segment_size = DEFAULT_SEGMENT_SIZE;
        }
        if self.segment_entries == 0 {
            self.segment_entries = DEFAULT_SEGMENT_ENTRIES;
        }
        if self.encode_buffer_size == 0 {
            self.encode_buffer_size = DEFAULT_ENCODE_BUFFER_SIZE;
        }
        if self.write_buffer_size == 0 {
            self.write_buffer_size = DEFAULT_WRITE_BUFFER_SIZE;
        }
        if self.log_suffix.is_empty() {
            self.log_suffix = DEFAULT_LOG_SUFFIX.to_string();
        }
        if self.index_suffix.is_empty() {
            self.index_suffix = DEFAULT_INDEX_SUFFIX.to_string();
        }
        if self.base == 0 {
            self.base = DEFAULT_BASE;
        } else if !(2..=36).contains(&self.base) {
            return Err(WalError::Base);
        }
        Ok(self)
    }
}
