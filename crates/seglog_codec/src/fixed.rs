//! Fixed-width 8-byte little-endian `u64` codec.
//!
//! Segment index files are dense tables of these slots, so the accessors
//! operate on borrowed slices rather than growable buffers.

/// Encoded width of a fixed `u64`.
pub const U64_LEN: usize = 8;

/// Writes `value` into the first eight bytes of `buf`.
///
/// # Panics
///
/// Panics when `buf` is shorter than eight bytes.
pub fn put_u64_le(buf: &mut [u8], value: u64) {
    buf[..U64_LEN].copy_from_slice(&value.to_le_bytes());
}

/// Reads a `u64` from the first eight bytes of `buf`.
///
/// # Panics
///
/// Panics when `buf` is shorter than eight bytes.
#[must_use]
pub fn get_u64_le(buf: &[u8]) -> u64 {
    u64::from_le_bytes(
        buf[..U64_LEN]
            .try_into()
            .expect("slice is exactly eight bytes"),
    )
}
