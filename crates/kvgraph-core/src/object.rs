use std::future::Future;
use std::pin::Pin;

use kvgraph_codec::make_pointer;

use crate::error::GraphResult;
use crate::list::IndexedSequence;
use crate::map::KeyedMap;
use crate::queue::MutationQueue;
use crate::registry::CompositeKind;
use crate::value::Value;

/// Boxed `Send` future, used where composite operations recurse.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A persisted composite value: a handle to its base name in the store.
///
/// Cloning a handle is cheap; clones share one mutation queue.
#[derive(Clone, Debug)]
pub enum Object {
    Map(KeyedMap),
    List(IndexedSequence),
}

impl Object {
    /// Base store key of the composite.
    pub fn name(&self) -> &str {
        match self {
            Self::Map(m) => m.name(),
            Self::List(l) => l.name(),
        }
    }

    pub fn kind(&self) -> CompositeKind {
        match self {
            Self::Map(_) => CompositeKind::Map,
            Self::List(_) => CompositeKind::List,
        }
    }

    /// `Pointer?<name>` reference to this composite.
    pub fn pointer(&self) -> String {
        make_pointer(self.name())
    }

    pub fn as_map(&self) -> Option<&KeyedMap> {
        match self {
            Self::Map(m) => Some(m),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&IndexedSequence> {
        match self {
            Self::List(l) => Some(l),
            Self::Map(_) => None,
        }
    }

    pub fn into_map(self) -> Option<KeyedMap> {
        match self {
            Self::Map(m) => Some(m),
            Self::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<IndexedSequence> {
        match self {
            Self::List(l) => Some(l),
            Self::Map(_) => None,
        }
    }

    pub(crate) fn queue(&self) -> &MutationQueue {
        match self {
            Self::Map(m) => m.queue(),
            Self::List(l) => l.queue(),
        }
    }

    /// Run the composite's pending mutations.
    pub async fn flush(&self) -> GraphResult<()> {
        self.queue().flush().await
    }

    /// Remove the composite and every owned nested composite from the store.
    pub fn destroy(&self) -> BoxFuture<'_, GraphResult<()>> {
        Box::pin(async move {
            match self {
                Self::Map(m) => m.destroy().await,
                Self::List(l) => l.destroy().await,
            }
        })
    }

    /// Read the whole composite back into an in-memory tree.
    pub fn materialize(&self) -> BoxFuture<'_, GraphResult<Value>> {
        Box::pin(async move {
            match self {
                Self::Map(m) => m.materialize().await,
                Self::List(l) => l.materialize().await,
            }
        })
    }
}

/// Handles are equal when they name the same composite of the same kind.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.name() == other.name()
    }
}
