//! # seglog codec
//!
//! Wire-level integer codecs shared by the seglog crates.
//!
//! Two encodings live here:
//!
//! - **Varint**: unsigned 64-bit integers in the common 7-bits-per-byte
//!   little-endian form, continuation bit set on every non-terminal byte.
//!   Used as the length prefix of each log entry.
//! - **Fixed u64**: 8-byte little-endian, used for the slots of a segment
//!   index file.
//!
//! ## Usage
//!
//! ```
//! use seglog_codec::{decode_varint, encode_varint};
//!
//! let mut buf = Vec::new();
//! encode_varint(&mut buf, 300);
//! let (value, read) = decode_varint(&buf).unwrap();
//! assert_eq!(value, 300);
//! assert_eq!(read, buf.len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod fixed;
mod varint;

pub use error::{CodecError, CodecResult};
pub use fixed::{get_u64_le, put_u64_le, U64_LEN};
pub use varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
