//! Composite type registry and polymorphic dispatch.
//!
//! A [`Registry`] is built once, before any graph is used, and shared
//! read-only through [`Graph`]. Dispatch is a linear scan in registration
//! order, either by stored type tag (reads) or by in-memory shape (writes).
//! When two implementations accept the same shape the first registered wins.

use async_trait::async_trait;
use kvgraph_codec::{DICTIONARY_LABEL, DICTIONARY_TAG, LIST_LABEL, LIST_TAG};

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::list::ListType;
use crate::map::MapType;
use crate::object::Object;
use crate::value::Value;

/// The composite formats kvgraph knows how to store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Map,
    List,
}

impl CompositeKind {
    /// Versioned format label carried inside the type tag.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Map => DICTIONARY_LABEL,
            Self::List => LIST_LABEL,
        }
    }

    /// Type tag written at the composite's base key.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Map => DICTIONARY_TAG,
            Self::List => LIST_TAG,
        }
    }
}

impl std::fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Map => write!(f, "map"),
            Self::List => write!(f, "list"),
        }
    }
}

/// A composite implementation that can be selected by dispatch.
#[async_trait]
pub trait CompositeType: Send + Sync {
    /// The handle variant this implementation produces.
    fn kind(&self) -> CompositeKind;

    /// Whether a stored type tag belongs to this implementation.
    fn matches(&self, tag: &str) -> bool {
        tag == self.kind().tag()
    }

    /// Whether this implementation can persist the given in-memory value.
    fn accepts(&self, value: &Value) -> bool;

    /// Write `value` as a new composite at `name` and flush it.
    async fn persist(&self, name: &str, value: Value, graph: Graph) -> GraphResult<Object>;

    /// Handle for an existing composite at `name`. Performs no I/O.
    fn load(&self, name: &str, graph: Graph) -> Object;
}

/// Ordered table of composite implementations.
pub struct Registry {
    types: Vec<Box<dyn CompositeType>>,
}

impl Registry {
    /// An empty registry. Every lookup misses until something is registered.
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// The built-in map and list implementations, in that order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(MapType);
        registry.register(ListType);
        registry
    }

    /// Append an implementation. Earlier registrations take precedence.
    pub fn register<T: CompositeType + 'static>(&mut self, implementation: T) -> &mut Self {
        self.types.push(Box::new(implementation));
        self
    }

    /// First implementation owning `tag`.
    pub fn select_by_tag(&self, tag: &str) -> Option<&dyn CompositeType> {
        self.types.iter().find(|t| t.matches(tag)).map(|t| t.as_ref())
    }

    /// First implementation accepting the runtime shape of `value`.
    pub fn select_by_shape(&self, value: &Value) -> Option<&dyn CompositeType> {
        self.types.iter().find(|t| t.accepts(value)).map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(|t| t.kind()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use kvgraph_store::InMemoryKeyValueStore;
    use std::sync::Arc;

    #[test]
    fn standard_selects_by_tag() {
        let registry = Registry::standard();
        assert_eq!(
            registry.select_by_tag(DICTIONARY_TAG).map(|t| t.kind()),
            Some(CompositeKind::Map)
        );
        assert_eq!(
            registry.select_by_tag(LIST_TAG).map(|t| t.kind()),
            Some(CompositeKind::List)
        );
        assert!(registry.select_by_tag("bm90IGEgdGFn").is_none());
    }

    #[test]
    fn standard_selects_by_shape() {
        let registry = Registry::standard();
        let map = Value::Map(BTreeMap::new());
        let list = Value::List(vec![]);
        assert_eq!(
            registry.select_by_shape(&map).map(|t| t.kind()),
            Some(CompositeKind::Map)
        );
        assert_eq!(
            registry.select_by_shape(&list).map(|t| t.kind()),
            Some(CompositeKind::List)
        );
        assert!(registry.select_by_shape(&Value::from(1)).is_none());
    }

    #[test]
    fn empty_registry_misses() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.select_by_tag(LIST_TAG).is_none());
        assert!(registry.select_by_shape(&Value::List(vec![])).is_none());
    }

    /// Claims every list, loading it as a map. Used to observe precedence.
    struct GreedyType;

    #[async_trait]
    impl CompositeType for GreedyType {
        fn kind(&self) -> CompositeKind {
            CompositeKind::Map
        }

        fn matches(&self, tag: &str) -> bool {
            tag == LIST_TAG
        }

        fn accepts(&self, value: &Value) -> bool {
            matches!(value, Value::List(_))
        }

        async fn persist(&self, name: &str, value: Value, graph: Graph) -> GraphResult<Object> {
            MapType.persist(name, value, graph).await
        }

        fn load(&self, name: &str, graph: Graph) -> Object {
            MapType.load(name, graph)
        }
    }

    #[test]
    fn registration_order_decides_overlaps() {
        let mut registry = Registry::new();
        registry.register(GreedyType).register(ListType);
        assert_eq!(registry.len(), 2);

        let picked = registry.select_by_tag(LIST_TAG).unwrap();
        let graph = Graph::new(Arc::new(InMemoryKeyValueStore::new()));
        assert_eq!(picked.load("x", graph).kind(), CompositeKind::Map);
    }

    #[test]
    fn kind_labels_and_tags() {
        assert_eq!(CompositeKind::Map.label(), "<Dictionary 1>");
        assert_eq!(CompositeKind::List.label(), "<List 1>");
        assert_ne!(CompositeKind::Map.tag(), CompositeKind::List.tag());
        assert_eq!(CompositeKind::List.to_string(), "list");
    }

    #[test]
    fn debug_lists_kinds() {
        assert_eq!(format!("{:?}", Registry::standard()), "[Map, List]");
    }
}
