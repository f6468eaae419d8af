use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::file::{FileKeyValueStore, SyncMode};
use crate::memory::InMemoryKeyValueStore;
use crate::traits::KeyValueStore;

/// Backend selection for a kvgraph store.
///
/// ```toml
/// backend = "file"
/// path = "/var/lib/kvgraph/store.json"
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Volatile in-memory map.
    #[default]
    Memory,
    /// JSON snapshot file.
    File {
        path: PathBuf,
        #[serde(default)]
        sync_mode: SyncMode,
    },
}

impl StoreConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Construct the configured backend.
    pub fn open(&self) -> StoreResult<Arc<dyn KeyValueStore>> {
        match self {
            Self::Memory => Ok(Arc::new(InMemoryKeyValueStore::new())),
            Self::File { path, sync_mode } => {
                Ok(Arc::new(FileKeyValueStore::open(path, *sync_mode)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_memory() {
        assert_eq!(StoreConfig::default(), StoreConfig::Memory);
    }

    #[test]
    fn parse_memory() {
        let c = StoreConfig::from_toml_str(r#"backend = "memory""#).unwrap();
        assert_eq!(c, StoreConfig::Memory);
    }

    #[test]
    fn parse_file_with_default_sync() {
        let c = StoreConfig::from_toml_str(
            r#"
            backend = "file"
            path = "data/store.json"
            "#,
        )
        .unwrap();
        assert_eq!(
            c,
            StoreConfig::File {
                path: PathBuf::from("data/store.json"),
                sync_mode: SyncMode::OsDefault,
            }
        );
    }

    #[test]
    fn parse_file_with_sync_mode() {
        let c = StoreConfig::from_toml_str(
            r#"
            backend = "file"
            path = "s.json"
            sync_mode = "every_write"
            "#,
        )
        .unwrap();
        assert!(matches!(
            c,
            StoreConfig::File { sync_mode: SyncMode::EveryWrite, .. }
        ));
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = StoreConfig::from_toml_str(r#"backend = "redis""#).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[tokio::test]
    async fn open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::File {
            path: dir.path().join("kv.json"),
            sync_mode: SyncMode::EveryWrite,
        };
        let store = config.open().unwrap();
        store.set("k", "v").await.unwrap();
        assert!(dir.path().join("kv.json").exists());
    }

    #[tokio::test]
    async fn open_memory_backend() {
        let store = StoreConfig::Memory.open().unwrap();
        assert!(!store.exists("k").await.unwrap());
    }
}
