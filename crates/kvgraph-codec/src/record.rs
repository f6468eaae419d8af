//! Composite bookkeeping records: type tags, key indexes, sequence lengths.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ciborium::value::Value as Cbor;

use crate::error::{CodecError, CodecResult};

/// CBOR semantic tag for a finite set.
const SET_TAG: u64 = 258;

/// Label of the keyed-map format.
pub const DICTIONARY_LABEL: &str = "<Dictionary 1>";

/// Label of the indexed-sequence format.
pub const LIST_LABEL: &str = "<List 1>";

/// `type_tag(DICTIONARY_LABEL)`, precomputed.
pub const DICTIONARY_TAG: &str = "oWR0eXBlbjxEaWN0aW9uYXJ5IDE+";

/// `type_tag(LIST_LABEL)`, precomputed.
pub const LIST_TAG: &str = "oWR0eXBlaDxMaXN0IDE+";

pub(crate) fn cbor_to_base64(value: &Cbor) -> CodecResult<String> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buf))
}

pub(crate) fn cbor_from_base64(text: &str) -> CodecResult<Cbor> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| CodecError::Decode(format!("base64: {e}")))?;
    ciborium::de::from_reader(bytes.as_slice()).map_err(|e| CodecError::Decode(format!("cbor: {e}")))
}

/// Type tag stored at a composite's base key: `base64(cbor {"type": label})`.
pub fn type_tag(label: &str) -> CodecResult<String> {
    cbor_to_base64(&Cbor::Map(vec![(
        Cbor::Text("type".into()),
        Cbor::Text(label.into()),
    )]))
}

/// Encode a map's key index as a CBOR array of text strings.
pub fn encode_keys<S: AsRef<str>>(keys: &[S]) -> CodecResult<String> {
    cbor_to_base64(&Cbor::Array(
        keys.iter().map(|k| Cbor::Text(k.as_ref().to_string())).collect(),
    ))
}

/// Decode a key index. Accepts a plain array or a tag-258 set.
pub fn decode_keys(text: &str) -> CodecResult<Vec<String>> {
    let items = match cbor_from_base64(text)? {
        Cbor::Array(items) => items,
        Cbor::Tag(SET_TAG, inner) => match *inner {
            Cbor::Array(items) => items,
            _ => return Err(CodecError::Decode("key set does not wrap an array".into())),
        },
        _ => return Err(CodecError::Decode("key index is not an array".into())),
    };
    items
        .into_iter()
        .map(|item| match item {
            Cbor::Text(key) => Ok(key),
            other => Err(CodecError::Decode(format!("non-text key in index: {other:?}"))),
        })
        .collect()
}

/// Encode a sequence length as `base64(u16 little-endian)`.
pub fn encode_length(length: u16) -> String {
    STANDARD.encode(length.to_le_bytes())
}

/// Decode a sequence length record.
pub fn decode_length(text: &str) -> CodecResult<u16> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| CodecError::Decode(format!("base64: {e}")))?;
    let raw: [u8; 2] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CodecError::Decode(format!("length must be 2 bytes, got {}", bytes.len())))?;
    Ok(u16::from_le_bytes(raw))
}
