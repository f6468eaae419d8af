//! Object-graph persistence over a flat key/value store.
//!
//! A [`Graph`] stores nested maps and sequences as many small string entries
//! in one [`KeyValueStore`]. Scalars are written inline as self-describing
//! natives; composites get a type tag at their base key plus one entry per
//! element, and are linked from their parent by `Pointer?<name>` strings.
//!
//! # Composites
//!
//! - [`KeyedMap`] -- string keys, with a key index at `<name>_keys`
//! - [`IndexedSequence`] -- dense integer indices, with a length at `<name>_length`
//!
//! Both are reached through a [`Registry`] that dispatches on the stored
//! type tag when reading and on the in-memory [`Value`] shape when writing.
//!
//! # Design Rules
//!
//! 1. Handles are lazy: loading one does no I/O, reads go to the store.
//! 2. Writes are queued per composite and applied in order on flush.
//! 3. A composite persisted as an element belongs to its parent and is
//!    destroyed with it. Handles stored as elements are references only.
//! 4. There is no multi-key atomicity. A failed flush keeps what ran.

pub mod error;
pub mod graph;
pub mod list;
pub mod map;
pub mod object;
pub mod queue;
pub mod registry;
pub mod value;

pub use error::{GraphError, GraphResult};
pub use graph::{Graph, MAX_POINTER_HOPS};
pub use list::{IndexedSequence, Iter};
pub use map::{Items, KeyedMap, Values};
pub use object::{BoxFuture, Object};
pub use queue::{MutationQueue, Operation};
pub use registry::{CompositeKind, CompositeType, Registry};
pub use value::Value;

pub use kvgraph_codec::{NativeKind, NativeValue};
pub use kvgraph_store::{
    FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, StoreConfig, StoreError, SyncMode,
};
