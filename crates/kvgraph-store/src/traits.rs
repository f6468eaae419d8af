use async_trait::async_trait;

use crate::error::StoreResult;

/// Flat, asynchronous string key/value store.
///
/// All implementations must satisfy these invariants:
/// - Keys and values are opaque strings. The store never interprets them.
/// - `get` fails with [`StoreError::NotFound`](crate::StoreError::NotFound)
///   when the key is absent.
/// - Each call is independent. There is no multi-key atomicity and no
///   ordering guarantee between concurrent callers.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored at `key`.
    async fn get(&self, key: &str) -> StoreResult<String>;

    /// Write (create or overwrite) the value at `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Check whether `key` is present.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Delete `key`. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}
