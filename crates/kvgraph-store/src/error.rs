/// Errors from key/value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key was not found.
    #[error("key not found: {0}")]
    NotFound(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization of the backing document failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store configuration could not be parsed or applied.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
