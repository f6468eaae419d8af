use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::KeyValueStore;

/// Flush/sync strategy for the snapshot file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` the snapshot before every rename (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Key/value store persisted as a single JSON document.
///
/// The whole map lives in memory. After every mutation the document is
/// written to a temporary file next to the target and atomically renamed
/// over it, so a crash leaves either the previous or the new snapshot on
/// disk, never a torn one.
///
/// On-disk format:
/// ```text
/// { "<key>": "<value>", ... }
/// ```
pub struct FileKeyValueStore {
    /// Path to the snapshot document.
    path: PathBuf,
    sync_mode: SyncMode,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or create) a store backed by the document at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries: BTreeMap<String, String> = if path.exists() {
            let raw = fs::read(path)?;
            serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))?
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), entries = entries.len(), "file store opened");

        Ok(Self {
            path: path.to_path_buf(),
            sync_mode,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("file store mutex poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the snapshot through a temp file and rename it into place.
    fn write_snapshot(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, entries)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tmp.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %self.path.display(), entries = entries.len(), "snapshot written");
        Ok(())
    }

    /// Apply `mutate` and persist; the in-memory change is undone if the
    /// snapshot cannot be written.
    fn mutate<T>(
        &self,
        key: &str,
        mutate: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> StoreResult<T> {
        let mut map = self.entries.lock().expect("file store mutex poisoned");
        let previous = map.get(key).cloned();
        let out = mutate(&mut map);
        if let Err(e) = self.write_snapshot(&map) {
            match previous {
                Some(value) => map.insert(key.to_string(), value),
                None => map.remove(key),
            };
            return Err(e);
        }
        Ok(out)
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<String> {
        let map = self.entries.lock().expect("file store mutex poisoned");
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.mutate(key, |map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let map = self.entries.lock().expect("file store mutex poisoned");
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        {
            let map = self.entries.lock().expect("file store mutex poisoned");
            if !map.contains_key(key) {
                return Ok(false);
            }
        }
        self.mutate(key, |map| map.remove(key).is_some())
    }
}

impl std::fmt::Debug for FileKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyValueStore")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileKeyValueStore::open(&path, SyncMode::EveryWrite).unwrap();
            store.set("a", "1").await.unwrap();
            store.set("b", "2").await.unwrap();
            assert_eq!(store.get("a").await.unwrap(), "1");
        }

        let reopened = FileKeyValueStore::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("b").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn delete_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileKeyValueStore::open(&path, SyncMode::OsDefault).unwrap();
        store.set("gone", "soon").await.unwrap();
        assert!(store.delete("gone").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
        drop(store);

        let reopened = FileKeyValueStore::open(&path, SyncMode::OsDefault).unwrap();
        assert!(!reopened.exists("gone").await.unwrap());
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.json");

        let store = FileKeyValueStore::open(&path, SyncMode::OsDefault).unwrap();
        store.set("k", "v").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(&dir.path().join("s.json"), SyncMode::OsDefault).unwrap();
        assert!(matches!(
            store.get("nope").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn corrupt_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"not json").unwrap();

        let err = FileKeyValueStore::open(&path, SyncMode::OsDefault).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn sync_mode_default_is_os() {
        assert_eq!(SyncMode::default(), SyncMode::OsDefault);
    }
}
