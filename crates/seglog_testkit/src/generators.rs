//! Property-based test generators.
//!
//! Proptest strategies for payloads and batches of payloads, plus the
//! round-trip properties that use them.

use proptest::prelude::*;

/// Strategy producing a single payload of 0 to 255 bytes.
pub fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy producing a non-empty batch of payloads.
pub fn payload_batch(max_len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload(), 1..max_len)
}

/// Strategy producing a starting index away from the trivial 1.
pub fn start_index() -> impl Strategy<Value = u64> {
    1u64..10_000
}
