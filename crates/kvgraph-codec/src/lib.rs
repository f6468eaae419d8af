//! String wire formats for kvgraph.
//!
//! Everything kvgraph writes into the flat store is one of a handful of
//! textual forms. This crate produces and parses all of them; it performs no
//! I/O.
//!
//! # Forms
//!
//! - [`native`] -- `Native?<base64(cbor {type, data})>`, a self-describing scalar
//! - [`marker`] -- `Pointer?<key>` references and classification of raw strings
//! - [`record`] -- composite type tags, map key indexes, sequence lengths
//!
//! All structured payloads are CBOR, base64-encoded with the standard padded
//! alphabet. Fixed-width numbers are little-endian.

pub mod error;
pub mod marker;
pub mod native;
pub mod record;

pub use error::{CodecError, CodecResult};
pub use marker::{classify, make_pointer, parse_pointer, StoredForm, NATIVE_MARKER, POINTER_MARKER};
pub use native::{NativeKind, NativeValue};
pub use record::{
    decode_keys, decode_length, encode_keys, encode_length, type_tag, DICTIONARY_LABEL,
    DICTIONARY_TAG, LIST_LABEL, LIST_TAG,
};
