//! prefixed-compact is a compact, self-delimiting, streamable binary encoding for four kinds of
//! value:
//!
//! - Bytes: an arbitrary byte string
//! - KeyValue: a byte-string key paired with one nested value
//! - Sequence: an ordered list of values
//! - Map: a set of byte-string keys, each with one value
//!
//! Every value starts with a 1- or 2-byte header carrying its type, its length, and whether it is
//! the last chunk of that value. Anything longer than [`MAX_CHUNK_LEN`] bytes or elements is split
//! across several chunks, so an encoder never needs to know more than 4096 items ahead. Values
//! are simply concatenated; there is no framing, padding, or magic number.
//!
//! # Encoding
//!
//! ```
//! use prefixed_compact::{encode_to_vec, Value};
//!
//! let value = Value::key_value("id", "world");
//! assert_eq!(encode_to_vec(&value).unwrap(), b"\xc2id\x85world");
//! ```
//!
//! # Decoding
//!
//! [`decode`] returns an owned [`Value`] together with the number of bytes it took. [`decode_ref`]
//! borrows single-chunk payloads straight out of the buffer instead. Both honor a set of
//! [`DecodeOptions`] that bound nesting depth and decide how strictly the grammar is enforced.
//!
//! ```
//! use prefixed_compact::{decode, Value};
//!
//! let (used, value) = decode(b"\xa2\x81a\xa0").unwrap();
//! assert_eq!(used, 4);
//! assert_eq!(value, Value::Sequence(vec![Value::from("a"), Value::Sequence(Vec::new())]));
//! ```
//!
//! # Validating
//!
//! [`validate`] checks a stream from any [`std::io::Read`] source without building values or
//! copying payloads, and reports how many top-level values it holds. For any buffer and any set
//! of options it agrees with the decoder.
//!
//! # Serde
//!
//! [`to_vec`] and [`from_slice`] map ordinary Rust data onto the format; see the [`ser`] module
//! for how each kind of data is represented.

mod depth_tracking;
mod error;
mod options;
mod value;
mod value_ref;

pub mod de;
pub mod decode;
pub mod encode;
pub mod header;
pub mod ser;
pub mod validate;

pub use de::{from_slice, from_value_ref};
pub use decode::{decode, decode_all, decode_ref, decode_ref_with_options, Decoder};
pub use encode::{encode, encode_to_vec, encoded_len, Encoder};
pub use error::{Error, ErrorKind, Result};
pub use header::{CompositeType, Header};
pub use options::{DecodeOptions, DuplicateKeys, HeaderWidths};
pub use ser::{to_value, to_vec, to_writer};
pub use validate::{validate, validate_slice, validate_with_options, Validator};
pub use value::Value;
pub use value_ref::ValueRef;

/// Largest payload, element count, or entry count a single chunk can carry.
pub const MAX_CHUNK_LEN: usize = 4096;

/// Largest size that fits in a 1-byte header.
pub const MAX_SHORT_LEN: usize = 15;

/// Default limit on how deeply sequences, maps, and key-value pairs may nest when decoding.
pub const MAX_DEPTH: usize = 100;
