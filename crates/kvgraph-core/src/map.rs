//! String-keyed composite.
//!
//! Store layout for a map named `m`:
//!
//! ```text
//! m          type tag <Dictionary 1>
//! m_keys     base64(cbor [key, ...])      membership index
//! m_k_<key>  native | pointer             one entry per key
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kvgraph_codec::{decode_keys, encode_keys};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::{ChildNaming, Element, Graph};
use crate::object::Object;
use crate::queue::MutationQueue;
use crate::registry::{CompositeKind, CompositeType};
use crate::value::Value;

fn index_key(name: &str) -> String {
    format!("{name}_keys")
}

fn entry_key(name: &str, key: &str) -> String {
    format!("{name}_k_{key}")
}

fn entry_keys(name: &str, keys: &[String]) -> Vec<String> {
    keys.iter().map(|key| entry_key(name, key)).collect()
}

fn element<'a>(
    name: &'a str,
    key: &'a str,
    slot: &'a str,
    keys: &'a [String],
    siblings: &'a [String],
) -> Element<'a> {
    Element {
        parent: name,
        key,
        slot,
        naming: ChildNaming::Keyed(keys),
        siblings,
    }
}

async fn read_index(graph: &Graph, name: &str) -> GraphResult<Vec<String>> {
    let raw = graph.store().get(&index_key(name)).await?;
    Ok(decode_keys(&raw)?)
}

async fn write_index(graph: &Graph, name: &str, keys: &[String]) -> GraphResult<()> {
    graph.store().set(&index_key(name), &encode_keys(keys)?).await?;
    Ok(())
}

/// Handle to a persisted string-keyed map.
///
/// Reads go straight to the store. Writes (`set`, `remove`) are queued and
/// take effect on [`flush`](Self::flush) or at the end of a
/// [`batch`](Self::batch).
#[derive(Clone)]
pub struct KeyedMap {
    name: String,
    graph: Graph,
    queue: Arc<MutationQueue>,
}

impl KeyedMap {
    /// Handle for an existing map. Performs no I/O.
    pub fn load(name: impl Into<String>, graph: Graph) -> Self {
        let name = name.into();
        Self {
            queue: Arc::new(MutationQueue::new(name.clone())),
            name,
            graph,
        }
    }

    /// Write `data` as a new map at `name`.
    ///
    /// Any earlier composite at `name` is not cleaned up; use
    /// [`Graph::set`] to replace a value.
    pub async fn persist(
        name: impl Into<String>,
        data: BTreeMap<String, Value>,
        graph: Graph,
    ) -> GraphResult<Self> {
        let map = Self::load(name, graph);
        debug!(name = %map.name, entries = data.len(), "persisting map");

        let keys: Vec<String> = data.keys().cloned().collect();
        let store = map.graph.store();
        store.set(&map.name, CompositeKind::Map.tag()).await?;
        store.set(&index_key(&map.name), &encode_keys(&keys)?).await?;

        map.batch(move |m| {
            for (key, value) in data {
                m.set(key, value);
            }
        })
        .await?;
        Ok(map)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    /// Number of queued mutations.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run queued mutations in order.
    pub async fn flush(&self) -> GraphResult<()> {
        self.queue.flush().await
    }

    /// Queue mutations inside `f`, then flush them.
    pub async fn batch<F>(&self, f: F) -> GraphResult<()>
    where
        F: FnOnce(&Self),
    {
        f(self);
        self.flush().await
    }

    // ---- Reads ----

    /// Current key index, re-read from the store.
    pub async fn keys(&self) -> GraphResult<Vec<String>> {
        read_index(&self.graph, &self.name).await
    }

    pub async fn len(&self) -> GraphResult<usize> {
        Ok(self.keys().await?.len())
    }

    pub async fn is_empty(&self) -> GraphResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn has(&self, key: &str) -> GraphResult<bool> {
        Ok(self.graph.store().exists(&entry_key(&self.name, key)).await?)
    }

    /// Value stored under `key`.
    pub async fn get(&self, key: &str) -> GraphResult<Value> {
        let slot = entry_key(&self.name, key);
        if !self.graph.store().exists(&slot).await? {
            return Err(GraphError::KeyNotFound {
                name: self.name.clone(),
                key: key.to_string(),
            });
        }
        let raw = self.graph.store().get(&slot).await?;
        self.graph.resolve(&slot, raw).await
    }

    /// Like [`get`](Self::get), with `default` in place of `KeyNotFound`.
    pub async fn get_or(&self, key: &str, default: impl Into<Value>) -> GraphResult<Value> {
        match self.get(key).await {
            Err(GraphError::KeyNotFound { .. }) => Ok(default.into()),
            other => other,
        }
    }

    /// Lazy `(key, value)` cursor. The index is read on the first step.
    pub fn items(&self) -> Items<'_> {
        Items {
            map: self,
            keys: None,
        }
    }

    /// Lazy value cursor in index order.
    pub fn values(&self) -> Values<'_> {
        Values {
            items: self.items(),
        }
    }

    /// Read the whole map, nested composites included.
    pub async fn materialize(&self) -> GraphResult<Value> {
        let mut out = BTreeMap::new();
        let mut items = self.items();
        while let Some(item) = items.next().await {
            let (key, value) = item?;
            let value = match value {
                Value::Object(obj) => obj.materialize().await?,
                other => other,
            };
            out.insert(key, value);
        }
        Ok(Value::Map(out))
    }

    // ---- Queued writes ----

    /// Queue a write of `value` under `key`.
    ///
    /// At flush time the value is encoded (natives), referenced (handles) or
    /// persisted as an owned child (in-memory maps and lists), and `key` is
    /// added to the index as it stands then. Fails without writing anything
    /// if the map no longer has an index.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let name = self.name.clone();
        let graph = self.graph.clone();
        self.queue.enqueue(move || async move {
            let mut keys = read_index(&graph, &name).await?;
            let slot = entry_key(&name, &key);
            let siblings = entry_keys(&name, &keys);
            let at = element(&name, &key, &slot, &keys, &siblings);
            let encoded = graph.encode_element(&at, value).await?;
            graph.store().set(&slot, &encoded).await?;

            if !keys.contains(&key) {
                keys.push(key);
            }
            write_index(&graph, &name, &keys).await
        });
    }

    /// Queue removal of `key`, destroying the owned child it refers to
    /// unless another entry still points at it.
    pub fn remove(&self, key: impl Into<String>) {
        let key = key.into();
        let name = self.name.clone();
        let graph = self.graph.clone();
        self.queue.enqueue(move || async move {
            let mut keys = read_index(&graph, &name).await?;
            let slot = entry_key(&name, &key);
            let siblings = entry_keys(&name, &keys);
            graph
                .release_owned(&element(&name, &key, &slot, &keys, &siblings), None)
                .await?;
            graph.store().delete(&slot).await?;

            keys.retain(|k| *k != key);
            write_index(&graph, &name, &keys).await
        });
    }

    // ---- Destruction ----

    /// Delete every entry, owned nested composites, the index and the tag.
    ///
    /// A no-op once the tag is gone, so a second call cannot resurrect
    /// anything.
    pub async fn destroy(&self) -> GraphResult<()> {
        let store = self.graph.store();
        if !store.exists(&self.name).await? {
            debug!(name = %self.name, "map already destroyed");
            return Ok(());
        }

        let index = index_key(&self.name);
        let keys = if store.exists(&index).await? {
            self.keys().await?
        } else {
            Vec::new()
        };
        debug!(name = %self.name, entries = keys.len(), "destroying map");
        let siblings = entry_keys(&self.name, &keys);
        for key in &keys {
            let slot = entry_key(&self.name, key);
            self.graph
                .release_owned(&element(&self.name, key, &slot, &keys, &siblings), None)
                .await?;
            store.delete(&slot).await?;
        }
        store.delete(&index).await?;
        store.delete(&self.name).await?;
        Ok(())
    }
}

impl std::fmt::Debug for KeyedMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedMap")
            .field("name", &self.name)
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Lazy cursor over a map's entries.
///
/// Each step resolves one key against the live store, so mutations flushed
/// between steps are visible. Call [`KeyedMap::items`] again to restart.
pub struct Items<'a> {
    map: &'a KeyedMap,
    keys: Option<std::vec::IntoIter<String>>,
}

impl Items<'_> {
    pub async fn next(&mut self) -> Option<GraphResult<(String, Value)>> {
        if self.keys.is_none() {
            match self.map.keys().await {
                Ok(keys) => self.keys = Some(keys.into_iter()),
                Err(e) => {
                    self.keys = Some(Vec::new().into_iter());
                    return Some(Err(e));
                }
            }
        }
        let key = self.keys.as_mut()?.next()?;
        Some(self.map.get(&key).await.map(|value| (key, value)))
    }
}

/// Lazy cursor over a map's values.
pub struct Values<'a> {
    items: Items<'a>,
}

impl Values<'_> {
    pub async fn next(&mut self) -> Option<GraphResult<Value>> {
        self.items
            .next()
            .await
            .map(|item| item.map(|(_, value)| value))
    }
}

/// Registry entry for [`KeyedMap`].
pub(crate) struct MapType;

#[async_trait]
impl CompositeType for MapType {
    fn kind(&self) -> CompositeKind {
        CompositeKind::Map
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    async fn persist(&self, name: &str, value: Value, graph: Graph) -> GraphResult<Object> {
        match value {
            Value::Map(data) => Ok(Object::Map(KeyedMap::persist(name, data, graph).await?)),
            other => Err(GraphError::UnknownType(format!(
                "map type cannot persist {}",
                other.shape()
            ))),
        }
    }

    fn load(&self, name: &str, graph: Graph) -> Object {
        Object::Map(KeyedMap::load(name, graph))
    }
}
