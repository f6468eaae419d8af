//! Self-describing scalar encoding.
//!
//! ```text
//! Native?<base64(cbor {"type": <kind>, "data": <bytes>})>
//! ```
//!
//! | kind      | data                              |
//! |-----------|-----------------------------------|
//! | `Integer` | 8 bytes, signed, little-endian    |
//! | `Decimal` | 8 bytes, IEEE 754, little-endian  |
//! | `String`  | UTF-8 bytes                       |
//! | `Binary`  | raw bytes                         |
//! | `Boolean` | 1 byte, 0 or 1                    |

use ciborium::value::Value as Cbor;

use crate::error::{CodecError, CodecResult};
use crate::marker::NATIVE_MARKER;
use crate::record::{cbor_from_base64, cbor_to_base64};

/// The five scalar kinds, named as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Integer,
    Decimal,
    String,
    Binary,
    Boolean,
}

impl NativeKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Decimal => "Decimal",
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Boolean => "Boolean",
        }
    }

    /// Parse a wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "Integer" => Some(Self::Integer),
            "Decimal" => Some(Self::Decimal),
            "String" => Some(Self::String),
            "Binary" => Some(Self::Binary),
            "Boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl std::fmt::Display for NativeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive scalar stored directly in one store entry.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Integer(i64),
    Decimal(f64),
    String(String),
    Binary(Vec<u8>),
    Boolean(bool),
}

impl NativeValue {
    /// Runtime kind of this value.
    pub fn kind(&self) -> NativeKind {
        match self {
            Self::Integer(_) => NativeKind::Integer,
            Self::Decimal(_) => NativeKind::Decimal,
            Self::String(_) => NativeKind::String,
            Self::Binary(_) => NativeKind::Binary,
            Self::Boolean(_) => NativeKind::Boolean,
        }
    }

    /// Fixed-width or raw payload bytes for the `data` field.
    fn pack(&self) -> Vec<u8> {
        match self {
            Self::Integer(v) => v.to_le_bytes().to_vec(),
            Self::Decimal(v) => v.to_le_bytes().to_vec(),
            Self::String(v) => v.as_bytes().to_vec(),
            Self::Binary(v) => v.clone(),
            Self::Boolean(v) => vec![u8::from(*v)],
        }
    }

    fn unpack(kind: NativeKind, data: Vec<u8>) -> CodecResult<Self> {
        let fixed = |data: &[u8]| -> CodecResult<[u8; 8]> {
            data.try_into().map_err(|_| {
                CodecError::Decode(format!("{kind} payload must be 8 bytes, got {}", data.len()))
            })
        };
        match kind {
            NativeKind::Integer => Ok(Self::Integer(i64::from_le_bytes(fixed(&data)?))),
            NativeKind::Decimal => Ok(Self::Decimal(f64::from_le_bytes(fixed(&data)?))),
            NativeKind::String => String::from_utf8(data)
                .map(Self::String)
                .map_err(|e| CodecError::Decode(e.to_string())),
            NativeKind::Binary => Ok(Self::Binary(data)),
            NativeKind::Boolean => match data.as_slice() {
                [b] => Ok(Self::Boolean(*b != 0)),
                other => Err(CodecError::Decode(format!(
                    "Boolean payload must be 1 byte, got {}",
                    other.len()
                ))),
            },
        }
    }

    /// Render the `Native?` wire form.
    pub fn encode(&self) -> CodecResult<String> {
        let record = Cbor::Map(vec![
            (Cbor::Text("type".into()), Cbor::Text(self.kind().as_str().into())),
            (Cbor::Text("data".into()), Cbor::Bytes(self.pack())),
        ]);
        Ok(format!("{NATIVE_MARKER}{}", cbor_to_base64(&record)?))
    }

    /// Parse the `Native?` wire form.
    pub fn decode(text: &str) -> CodecResult<Self> {
        let payload = text
            .strip_prefix(NATIVE_MARKER)
            .filter(|p| !p.is_empty())
            .ok_or(CodecError::UnknownMarker)?;

        let Cbor::Map(fields) = cbor_from_base64(payload)? else {
            return Err(CodecError::Decode("native record is not a map".into()));
        };

        let mut kind = None;
        let mut data = None;
        for (k, v) in fields {
            match (k, v) {
                (Cbor::Text(k), Cbor::Text(v)) if k == "type" => kind = Some(v),
                (Cbor::Text(k), Cbor::Bytes(v)) if k == "data" => data = Some(v),
                _ => {}
            }
        }
        let kind = kind.ok_or_else(|| CodecError::Decode("native record has no type".into()))?;
        let data = data.ok_or_else(|| CodecError::Decode("native record has no data".into()))?;
        let kind = NativeKind::from_wire(&kind).ok_or(CodecError::UnknownType(kind))?;
        Self::unpack(kind, data)
    }

    /// Cheap marker test. Never fails.
    pub fn is_encoded(text: &str) -> bool {
        text.len() > NATIVE_MARKER.len() && text.starts_with(NATIVE_MARKER)
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for NativeValue {
    fn from(v: f64) -> Self {
        Self::Decimal(v)
    }
}

impl From<bool> for NativeValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for NativeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for NativeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl From<&[u8]> for NativeValue {
    fn from(v: &[u8]) -> Self {
        Self::Binary(v.to_vec())
    }
}
