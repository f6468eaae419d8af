//! Integer-indexed composite.
//!
//! Store layout for a sequence named `s`:
//!
//! ```text
//! s          type tag <List 1>
//! s_length   base64(u16 LE)               element count
//! s_i_<n>    native | pointer             one entry per index in 0..length
//! ```
//!
//! The 2-byte counter caps a sequence at 65535 elements.

use std::sync::Arc;

use async_trait::async_trait;
use kvgraph_codec::{decode_length, encode_length};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::{ChildNaming, Element, Graph};
use crate::object::Object;
use crate::queue::MutationQueue;
use crate::registry::{CompositeKind, CompositeType};
use crate::value::Value;

fn length_key(name: &str) -> String {
    format!("{name}_length")
}

fn slot_key(name: &str, index: usize) -> String {
    format!("{name}_i_{index}")
}

fn slot_keys(name: &str, length: usize) -> Vec<String> {
    (0..length).map(|index| slot_key(name, index)).collect()
}

fn element<'a>(
    name: &'a str,
    key: &'a str,
    siblings: &'a [String],
    index: usize,
) -> Element<'a> {
    Element {
        parent: name,
        key,
        slot: &siblings[index],
        naming: ChildNaming::Indexed,
        siblings,
    }
}

async fn read_length(graph: &Graph, name: &str) -> GraphResult<usize> {
    let raw = graph.store().get(&length_key(name)).await?;
    Ok(usize::from(decode_length(&raw)?))
}

async fn write_length(graph: &Graph, name: &str, length: usize) -> GraphResult<()> {
    let length = u16::try_from(length).map_err(|_| GraphError::SequenceTooLong { len: length })?;
    graph.store().set(&length_key(name), &encode_length(length)).await?;
    Ok(())
}

/// Handle to a persisted sequence.
///
/// Reads go straight to the store. `set` and `remove` are queued until
/// [`flush`](Self::flush); `append` flushes on its own.
#[derive(Clone)]
pub struct IndexedSequence {
    name: String,
    graph: Graph,
    queue: Arc<MutationQueue>,
}

impl IndexedSequence {
    /// Handle for an existing sequence. Performs no I/O.
    pub fn load(name: impl Into<String>, graph: Graph) -> Self {
        let name = name.into();
        Self {
            queue: Arc::new(MutationQueue::new(name.clone())),
            name,
            graph,
        }
    }

    /// Write `data` as a new sequence at `name`.
    ///
    /// The length is written once, before the elements. Element writes
    /// never change it, so there is nothing to rewrite after the flush.
    pub async fn persist(
        name: impl Into<String>,
        data: Vec<Value>,
        graph: Graph,
    ) -> GraphResult<Self> {
        let len = data.len();
        if len > usize::from(u16::MAX) {
            return Err(GraphError::SequenceTooLong { len });
        }
        let list = Self::load(name, graph);
        debug!(name = %list.name, len, "persisting sequence");

        list.graph
            .store()
            .set(&list.name, CompositeKind::List.tag())
            .await?;
        write_length(&list.graph, &list.name, len).await?;

        list.batch(move |l| {
            for (index, value) in data.into_iter().enumerate() {
                l.set(index, value);
            }
        })
        .await?;
        Ok(list)
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

    /// Stored element count.
    pub async fn length(&self) -> GraphResult<usize> {
        read_length(&self.graph, &self.name).await
    }

    pub async fn is_empty(&self) -> GraphResult<bool> {
        Ok(self.length().await? == 0)
    }

    /// Element at `index`.
    pub async fn get(&self, index: usize) -> GraphResult<Value> {
        let slot = slot_key(&self.name, index);
        if !self.graph.store().exists(&slot).await? {
            return Err(GraphError::IndexOutOfRange {
                name: self.name.clone(),
                index,
            });
        }
        let raw = self.graph.store().get(&slot).await?;
        self.graph.resolve(&slot, raw).await
    }

    /// Lazy cursor over elements. The length is read on the first step.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: 0,
            length: None,
        }
    }

    /// Read the whole sequence, nested composites included.
    pub async fn materialize(&self) -> GraphResult<Value> {
        let mut out = Vec::new();
        let mut iter = self.iter();
        while let Some(item) = iter.next().await {
            let value = match item? {
                Value::Object(obj) => obj.materialize().await?,
                other => other,
            };
            out.push(value);
        }
        Ok(Value::List(out))
    }

    // ---- Writes ----

    /// Queue an overwrite of the element at `index`.
    ///
    /// Fails at flush time with `IndexOutOfRange` unless `index` is below
    /// the stored length. Never changes the length.
    pub fn set(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let name = self.name.clone();
        let graph = self.graph.clone();
        self.queue.enqueue(move || async move {
            let length = read_length(&graph, &name).await?;
            if index >= length {
                return Err(GraphError::IndexOutOfRange { name, index });
            }
            let key = index.to_string();
            let siblings = slot_keys(&name, length);
            let at = element(&name, &key, &siblings, index);
            let encoded = graph.encode_element(&at, value).await?;
            graph.store().set(at.slot, &encoded).await?;
            Ok(())
        });
    }

    /// Add `value` at the end and flush.
    ///
    /// The new length is written before the element, so the queued write
    /// targets a valid index.
    pub async fn append(&self, value: impl Into<Value>) -> GraphResult<()> {
        let target = self.length().await?;
        write_length(&self.graph, &self.name, target + 1).await?;
        self.set(target, value);
        self.flush().await
    }

    /// Queue removal of the element at `index`.
    ///
    /// Later elements move down one slot, in index order, and the length
    /// shrinks by one. An owned child at `index` is destroyed unless another
    /// element still points at it.
    pub fn remove(&self, index: usize) {
        let name = self.name.clone();
        let graph = self.graph.clone();
        self.queue.enqueue(move || async move {
            let length = read_length(&graph, &name).await?;
            if index >= length {
                return Err(GraphError::IndexOutOfRange { name, index });
            }
            let key = index.to_string();
            let siblings = slot_keys(&name, length);
            graph
                .release_owned(&element(&name, &key, &siblings, index), None)
                .await?;
            for i in index + 1..length {
                let raw = graph.store().get(&slot_key(&name, i)).await?;
                graph.store().set(&slot_key(&name, i - 1), &raw).await?;
            }
            graph.store().delete(&slot_key(&name, length - 1)).await?;
            write_length(&graph, &name, length - 1).await
        });
    }

    // ---- Destruction ----

    /// Delete every element (destroying owned children) and reset the
    /// length to zero. The sequence itself stays in place.
    pub async fn clear(&self) -> GraphResult<()> {
        let length = self.length().await?;
        debug!(name = %self.name, length, "clearing sequence");
        let siblings = slot_keys(&self.name, length);
        for (index, slot) in siblings.iter().enumerate() {
            let key = index.to_string();
            self.graph
                .release_owned(&element(&self.name, &key, &siblings, index), None)
                .await?;
            self.graph.store().delete(slot).await?;
        }
        write_length(&self.graph, &self.name, 0).await
    }

    /// Delete every element, the length and the tag.
    ///
    /// A no-op once the tag is gone.
    pub async fn destroy(&self) -> GraphResult<()> {
        let store = self.graph.store();
        if !store.exists(&self.name).await? {
            debug!(name = %self.name, "sequence already destroyed");
            return Ok(());
        }
        let length = length_key(&self.name);
        if store.exists(&length).await? {
            self.clear().await?;
        }
        store.delete(&length).await?;
        store.delete(&self.name).await?;
        debug!(name = %self.name, "sequence destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for IndexedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedSequence")
            .field("name", &self.name)
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Lazy cursor over a sequence's elements.
pub struct Iter<'a> {
    list: &'a IndexedSequence,
    next: usize,
    length: Option<usize>,
}

impl Iter<'_> {
    pub async fn next(&mut self) -> Option<GraphResult<Value>> {
        let length = match self.length {
            Some(length) => length,
            None => match self.list.length().await {
                Ok(length) => *self.length.insert(length),
                Err(e) => {
                    self.length = Some(0);
                    return Some(Err(e));
                }
            },
        };
        if self.next >= length {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.list.get(index).await)
    }
}

/// Registry entry for [`IndexedSequence`].
pub(crate) struct ListType;

#[async_trait]
impl CompositeType for ListType {
    fn kind(&self) -> CompositeKind {
        CompositeKind::List
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    async fn persist(&self, name: &str, value: Value, graph: Graph) -> GraphResult<Object> {
        match value {
            Value::List(data) => Ok(Object::List(IndexedSequence::persist(name, data, graph).await?)),
            other => Err(GraphError::UnknownType(format!(
                "list type cannot persist {}",
                other.shape()
            ))),
        }
    }

    fn load(&self, name: &str, graph: Graph) -> Object {
        Object::List(IndexedSequence::load(name, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvgraph_codec::LIST_TAG;
    use kvgraph_store::{InMemoryKeyValueStore, KeyValueStore};

    fn graph() -> (Arc<InMemoryKeyValueStore>, Graph) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        (store.clone(), Graph::new(store))
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    async fn persisted(values: &[i64]) -> (Arc<InMemoryKeyValueStore>, IndexedSequence) {
        let (store, graph) = graph();
        let list = IndexedSequence::persist("s", ints(values), graph).await.unwrap();
        (store, list)
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn persist_writes_tag_length_and_slots() {
        let (store, list) = persisted(&[10, 20]).await;
        assert_eq!(store.get("s").await.unwrap(), LIST_TAG);
        assert_eq!(store.get("s_length").await.unwrap(), "AgA=");
        assert!(store.exists("s_i_0").await.unwrap());
        assert!(store.exists("s_i_1").await.unwrap());
        assert_eq!(list.length().await.unwrap(), 2);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn persist_rejects_oversized_input() {
        let (_, graph) = graph();
        let data = vec![Value::from(0); usize::from(u16::MAX) + 1];
        let err = IndexedSequence::persist("big", data, graph).await.unwrap_err();
        assert!(matches!(err, GraphError::SequenceTooLong { len: 65536 }));
    }

    #[tokio::test]
    async fn empty_sequence() {
        let (_, list) = persisted(&[]).await;
        assert!(list.is_empty().await.unwrap());
        assert_eq!(list.materialize().await.unwrap(), Value::List(vec![]));
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_out_of_range() {
        let (_, list) = persisted(&[1]).await;
        let err = list.get(1).await.unwrap_err();
        assert!(matches!(err, GraphError::IndexOutOfRange { index: 1, .. }));
    }

    #[tokio::test]
    async fn iter_yields_in_order() {
        let (_, list) = persisted(&[3, 1, 2]).await;
        let mut iter = list.iter();
        let mut seen = Vec::new();
        while let Some(v) = iter.next().await {
            seen.push(v.unwrap().as_i64().unwrap());
        }
        assert_eq!(seen, vec![3, 1, 2]);
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn append_grows_by_one_and_lands_last() {
        let (_, list) = persisted(&[1, 2]).await;
        list.append("tail").await.unwrap();
        assert_eq!(list.length().await.unwrap(), 3);
        assert_eq!(list.get(2).await.unwrap(), Value::from("tail"));
    }

    #[tokio::test]
    async fn append_to_full_sequence_fails() {
        let (store, list) = persisted(&[]).await;
        store.set("s_length", &encode_length(u16::MAX)).await.unwrap();
        let err = list.append(1).await.unwrap_err();
        assert!(matches!(err, GraphError::SequenceTooLong { len: 65536 }));
        assert_eq!(list.length().await.unwrap(), usize::from(u16::MAX));
    }

    #[tokio::test]
    async fn set_overwrite_leaves_length_unchanged() {
        let (_, list) = persisted(&[1, 2, 3]).await;
        list.set(1, 20);
        list.set(1, 21);
        list.flush().await.unwrap();
        assert_eq!(list.length().await.unwrap(), 3);
        assert_eq!(list.materialize().await.unwrap(), Value::List(ints(&[1, 21, 3])));
    }

    #[tokio::test]
    async fn set_beyond_length_fails_at_flush() {
        let (store, list) = persisted(&[1]).await;
        list.set(1, 2);
        let err = list.flush().await.unwrap_err();
        assert!(matches!(err, GraphError::IndexOutOfRange { index: 1, .. }));
        assert!(!store.exists("s_i_1").await.unwrap());
    }

    #[tokio::test]
    async fn remove_shifts_later_elements_down() {
        let (store, list) = persisted(&[10, 20, 30, 40]).await;
        list.remove(1);
        list.flush().await.unwrap();
        assert_eq!(list.length().await.unwrap(), 3);
        assert_eq!(list.materialize().await.unwrap(), Value::List(ints(&[10, 30, 40])));
        assert!(!store.exists("s_i_3").await.unwrap());
    }

    #[tokio::test]
    async fn remove_last_and_first() {
        let (_, list) = persisted(&[1, 2, 3]).await;
        list.batch(|l| {
            l.remove(2);
            l.remove(0);
        })
        .await
        .unwrap();
        assert_eq!(list.materialize().await.unwrap(), Value::List(ints(&[2])));
    }

    #[tokio::test]
    async fn remove_out_of_range_fails() {
        let (_, list) = persisted(&[1]).await;
        list.remove(5);
        assert!(matches!(
            list.flush().await.unwrap_err(),
            GraphError::IndexOutOfRange { index: 5, .. }
        ));
        assert_eq!(list.length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queued_ops_see_earlier_effects() {
        let (_, list) = persisted(&[1, 2, 3]).await;
        // After removing index 0 the sequence has two elements, so index 2
        // no longer exists when the second op runs.
        list.remove(0);
        list.set(2, 99);
        assert!(list.flush().await.is_err());
        assert_eq!(list.materialize().await.unwrap(), Value::List(ints(&[2, 3])));
    }

    // -----------------------------------------------------------------------
    // Nested composites
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn remove_keeps_moved_children_and_drops_removed_one() {
        let (store, graph) = graph();
        let data = vec![
            Value::List(vec!["a".into()]),
            Value::List(vec!["b".into()]),
            Value::List(vec!["c".into()]),
        ];
        let list = IndexedSequence::persist("s", data, graph).await.unwrap();
        list.remove(0);
        list.flush().await.unwrap();

        assert!(!store.exists("0_from_s").await.unwrap());
        assert_eq!(store.get("s_i_0").await.unwrap(), "Pointer?1_from_s");
        assert_eq!(
            list.materialize().await.unwrap(),
            Value::List(vec![
                Value::List(vec!["b".into()]),
                Value::List(vec!["c".into()]),
            ])
        );

        // The slot vacated by the shift gets a fresh child name.
        list.append(Value::List(vec!["d".into()])).await.unwrap();
        assert_eq!(store.get("s_i_2").await.unwrap(), "Pointer?2_from_s#1");
        assert_eq!(
            list.get(1).await.unwrap().into_list().unwrap().materialize().await.unwrap(),
            Value::List(vec!["c".into()])
        );
    }

    #[tokio::test]
    async fn owned_child_referenced_by_sibling_survives_removal() {
        let (store, graph) = graph();
        let list = IndexedSequence::persist(
            "s",
            vec![Value::List(vec!["a".into()]), 0.into()],
            graph,
        )
        .await
        .unwrap();
        let child = list.get(0).await.unwrap();
        list.set(1, child);
        list.flush().await.unwrap();

        list.remove(0);
        list.flush().await.unwrap();

        assert!(store.exists("0_from_s").await.unwrap());
        assert_eq!(store.get("s_i_0").await.unwrap(), "Pointer?0_from_s");
        assert_eq!(
            list.materialize().await.unwrap(),
            Value::List(vec![Value::List(vec!["a".into()])])
        );

        list.destroy().await.unwrap();
        assert!(store.is_empty(), "left behind: {:?}", store.keys_with_prefix(""));
    }

    #[tokio::test]
    async fn grandchild_reference_is_not_released() {
        let (store, graph) = graph();
        let nested: Value = [("k", Value::List(vec![1.into()]))].into_iter().collect();
        let list = IndexedSequence::persist("s", vec![nested.clone()], graph)
            .await
            .unwrap();
        let grandchild = list
            .get(0)
            .await
            .unwrap()
            .into_map()
            .unwrap()
            .get("k")
            .await
            .unwrap();
        assert_eq!(grandchild.as_object().map(Object::name), Some("k_from_0_from_s"));

        list.append(grandchild).await.unwrap();
        list.set(1, 0);
        list.flush().await.unwrap();

        assert!(store.exists("k_from_0_from_s").await.unwrap());
        assert_eq!(
            list.materialize().await.unwrap(),
            Value::List(vec![nested, Value::from(0)])
        );
    }

    // -----------------------------------------------------------------------
    // Clear / Destroy
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn clear_keeps_sequence_usable() {
        let (store, list) = persisted(&[1, 2]).await;
        list.clear().await.unwrap();
        assert_eq!(list.length().await.unwrap(), 0);
        assert_eq!(store.keys_with_prefix(""), vec!["s", "s_length"]);

        list.append(5).await.unwrap();
        assert_eq!(list.materialize().await.unwrap(), Value::List(ints(&[5])));
    }

    #[tokio::test]
    async fn destroy_twice_leaves_nothing() {
        let (store, graph) = graph();
        let list = IndexedSequence::persist(
            "s",
            vec![1.into(), Value::List(vec![2.into()])],
            graph,
        )
        .await
        .unwrap();
        list.destroy().await.unwrap();
        assert!(store.is_empty(), "left behind: {:?}", store.keys_with_prefix(""));
        list.destroy().await.unwrap();
        assert!(store.is_empty());
    }
}
