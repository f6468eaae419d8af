//! Flat key/value storage for kvgraph.
//!
//! Every kvgraph value, however deeply nested, ends up as a set of string
//! entries in a single flat namespace. This crate defines that namespace: the
//! four-operation [`KeyValueStore`] contract and the backends that implement
//! it.
//!
//! # Storage Backends
//!
//! - [`InMemoryKeyValueStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileKeyValueStore`] -- in-memory map persisted as a JSON document
//!
//! Backends are usually constructed from a [`StoreConfig`].
//!
//! # Design Rules
//!
//! 1. The store never interprets values -- it is a pure string-to-string map.
//! 2. `get` on a missing key is an error; use `exists` to probe.
//! 3. No multi-key atomicity. Each call stands alone.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::{FileKeyValueStore, SyncMode};
pub use memory::InMemoryKeyValueStore;
pub use traits::KeyValueStore;
