use std::sync::Arc;

use kvgraph_codec::{classify, parse_pointer, NativeValue, StoredForm};
use kvgraph_store::KeyValueStore;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::list::IndexedSequence;
use crate::map::KeyedMap;
use crate::registry::Registry;
use crate::value::Value;

/// Upper bound on pointer hops followed by a single read.
pub const MAX_POINTER_HOPS: usize = 32;

/// Entry point to an object graph: a backing store plus a type registry.
///
/// Cheap to clone. Every composite handle carries one.
#[derive(Clone)]
pub struct Graph {
    store: Arc<dyn KeyValueStore>,
    registry: Arc<Registry>,
}

impl Graph {
    /// Graph over `store` with the standard map and list types.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_registry(store, Arc::new(Registry::standard()))
    }

    pub fn with_registry(store: Arc<dyn KeyValueStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Zero-I/O handle for the map at `name`.
    pub fn map(&self, name: impl Into<String>) -> KeyedMap {
        KeyedMap::load(name, self.clone())
    }

    /// Zero-I/O handle for the sequence at `name`.
    pub fn list(&self, name: impl Into<String>) -> IndexedSequence {
        IndexedSequence::load(name, self.clone())
    }

    // ---- Root-level access ----

    pub async fn exists(&self, key: &str) -> GraphResult<bool> {
        Ok(self.store.exists(key).await?)
    }

    /// Read the value at `key`, or `None` if the key is absent.
    pub async fn get(&self, key: &str) -> GraphResult<Option<Value>> {
        if !self.store.exists(key).await? {
            return Ok(None);
        }
        let raw = self.store.get(key).await?;
        self.resolve(key, raw).await.map(Some)
    }

    /// Write `value` at `key`.
    ///
    /// Natives are encoded in place and handles become pointers. In-memory
    /// maps and lists are persisted as a composite named `key`. Whatever was
    /// at `key` before is deleted first, composites recursively.
    pub async fn set(&self, key: &str, value: impl Into<Value>) -> GraphResult<()> {
        let value = value.into();
        if let Value::Object(obj) = &value {
            if obj.name() == key {
                return Ok(());
            }
        }
        self.delete(key).await?;

        match value {
            Value::Native(n) => self.store.set(key, &n.encode()?).await?,
            Value::Object(obj) => self.store.set(key, &obj.pointer()).await?,
            composite => {
                let ty = self
                    .registry
                    .select_by_shape(&composite)
                    .ok_or_else(|| GraphError::UnknownType(composite.shape()))?;
                ty.persist(key, composite, self.clone()).await?;
            }
        }
        Ok(())
    }

    /// Delete the value at `key`. Composites are destroyed recursively;
    /// pointers are removed without touching their target. Returns `false`
    /// if the key was absent.
    pub async fn delete(&self, key: &str) -> GraphResult<bool> {
        if !self.store.exists(key).await? {
            return Ok(false);
        }
        let raw = self.store.get(key).await?;
        match classify(&raw) {
            StoredForm::Native(_) | StoredForm::Pointer(_) => {
                self.store.delete(key).await?;
            }
            StoredForm::Tag(tag) => {
                let ty = self
                    .registry
                    .select_by_tag(tag)
                    .ok_or_else(|| GraphError::UnknownType(format!("tag {tag:?} at {key}")))?;
                ty.load(key, self.clone()).destroy().await?;
            }
        }
        Ok(true)
    }

    // ---- Resolution ----

    /// Follow one pointer hop: returns the target key and its raw contents.
    pub async fn resolve_pointer(&self, text: &str) -> GraphResult<(String, String)> {
        let target = parse_pointer(text)?;
        let raw = self.store.get(target).await?;
        Ok((target.to_string(), raw))
    }

    /// Turn the raw string read at `key` into a value: decode natives,
    /// follow pointers, and load composites through the registry.
    pub async fn resolve(&self, key: &str, raw: String) -> GraphResult<Value> {
        let mut key = key.to_string();
        let mut raw = raw;
        for _ in 0..=MAX_POINTER_HOPS {
            let next = match classify(&raw) {
                StoredForm::Native(text) => return Ok(Value::Native(NativeValue::decode(text)?)),
                StoredForm::Tag(tag) => {
                    let ty = self.registry.select_by_tag(tag).ok_or_else(|| {
                        GraphError::UnknownType(format!("tag {tag:?} at {key}"))
                    })?;
                    return Ok(Value::Object(ty.load(&key, self.clone())));
                }
                StoredForm::Pointer(_) => self.resolve_pointer(&raw).await?,
            };
            (key, raw) = next;
        }
        Err(GraphError::PointerChainTooLong {
            key,
            max: MAX_POINTER_HOPS,
        })
    }

    // ---- Element writes shared by composites ----

    /// Produce the string to store at `at.slot`.
    ///
    /// In-memory composites are persisted as an owned child named after
    /// `at.key`. An owned child previously stored at the slot is destroyed
    /// unless `value` is that same child.
    pub(crate) async fn encode_element(
        &self,
        at: &Element<'_>,
        value: Value,
    ) -> GraphResult<String> {
        match value {
            Value::Native(n) => {
                self.release_owned(at, None).await?;
                Ok(n.encode()?)
            }
            Value::Object(obj) => {
                self.release_owned(at, Some(obj.name())).await?;
                Ok(obj.pointer())
            }
            composite => {
                let ty = self
                    .registry
                    .select_by_shape(&composite)
                    .ok_or_else(|| GraphError::UnknownType(composite.shape()))?;
                self.release_owned(at, None).await?;
                let name = self.allocate_child(at.parent, at.key).await?;
                let obj = ty.persist(&name, composite, self.clone()).await?;
                Ok(obj.pointer())
            }
        }
    }

    /// Destroy the owned child referenced from `at.slot`, if any, unless it
    /// is named `keep` or another element of the same parent still points
    /// at it.
    pub(crate) async fn release_owned(
        &self,
        at: &Element<'_>,
        keep: Option<&str>,
    ) -> GraphResult<()> {
        if !self.store.exists(at.slot).await? {
            return Ok(());
        }
        let raw = self.store.get(at.slot).await?;
        let StoredForm::Pointer(target) = classify(&raw) else {
            return Ok(());
        };
        if keep == Some(target) || !owns(at.parent, target, &at.naming) {
            return Ok(());
        }
        if self.referenced_by_sibling(at, &raw).await? {
            debug!(parent = at.parent, child = target, "owned child still referenced, keeping");
            return Ok(());
        }
        debug!(parent = at.parent, child = target, "releasing owned child");
        self.delete(target).await?;
        Ok(())
    }

    async fn referenced_by_sibling(&self, at: &Element<'_>, pointer: &str) -> GraphResult<bool> {
        for slot in at.siblings.iter().filter(|s| s.as_str() != at.slot) {
            if self.store.exists(slot).await? && self.store.get(slot).await? == pointer {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// First free name of the form `<key>_from_<parent>[#n]`.
    async fn allocate_child(&self, parent: &str, key: &str) -> GraphResult<String> {
        let base = format!("{key}_from_{parent}");
        if !self.store.exists(&base).await? {
            return Ok(base);
        }
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{base}#{n}");
            if !self.store.exists(&candidate).await? {
                debug!(parent, child = %candidate, "child name taken, using suffix");
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// How a composite names the children it allocates.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ChildNaming<'a> {
    /// Map entries: a child is named after one of the current keys.
    Keyed(&'a [String]),
    /// Sequence elements: a child is named after an index. Removal shifts
    /// children down, so any index counts.
    Indexed,
}

/// One element slot of a composite, with the context needed to tell owned
/// children from references.
#[derive(Debug)]
pub(crate) struct Element<'a> {
    /// Base name of the composite.
    pub parent: &'a str,
    /// Element key (map key or decimal index) that new children are named after.
    pub key: &'a str,
    /// Store key of the element.
    pub slot: &'a str,
    pub naming: ChildNaming<'a>,
    /// Store keys of every element of the composite.
    pub siblings: &'a [String],
}

fn is_index(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `target` is a child name `parent` allocated itself, as opposed
/// to a grandchild or an unrelated composite.
pub(crate) fn owns(parent: &str, target: &str, naming: &ChildNaming<'_>) -> bool {
    let base = match target.rsplit_once('#') {
        Some((base, n)) if is_index(n) => base,
        _ => target,
    };
    let Some(key) = base.strip_suffix(&format!("_from_{parent}")) else {
        return false;
    };
    match naming {
        ChildNaming::Keyed(keys) => keys.iter().any(|k| k == key),
        ChildNaming::Indexed => is_index(key),
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
