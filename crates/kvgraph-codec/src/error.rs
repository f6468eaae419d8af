use thiserror::Error;

/// Errors produced while encoding or decoding stored strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text does not carry the `Native?` marker.
    #[error("missing native marker")]
    UnknownMarker,

    /// The native record names a kind outside the five scalar kinds.
    #[error("unknown native type: {0}")]
    UnknownType(String),

    /// The text does not match `Pointer?<key>`.
    #[error("not a pointer: {0}")]
    NotAPointer(String),

    /// CBOR serialization failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Malformed base64, CBOR, or record shape.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
