use kvgraph_codec::CodecError;
use kvgraph_store::StoreError;
use thiserror::Error;

/// Errors from object-graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored string could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The map has no entry for the key.
    #[error("key {key:?} not found in map {name}")]
    KeyNotFound { name: String, key: String },

    /// The sequence has no element at the index.
    #[error("index {index} out of range for sequence {name}")]
    IndexOutOfRange { name: String, index: usize },

    /// A stored tag or in-memory shape matched no registered composite type.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A sequence would exceed the 2-byte length counter.
    #[error("sequence of {len} elements exceeds the maximum of {}", u16::MAX)]
    SequenceTooLong { len: usize },

    /// Following pointers from `key` did not reach a payload.
    #[error("pointer chain from {key} exceeds {max} hops")]
    PointerChainTooLong { key: String, max: usize },
}

/// Result alias used throughout the core crate.
pub type GraphResult<T> = Result<T, GraphError>;
