//! Persistence of per-plugin config overrides.

use crate::core::sync::lock;
use crate::core::{Error, PluginId, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Overrides of one plugin, keyed by field name.
pub type ConfigValues = Map<String, Value>;

/// Every stored override, keyed by plugin identity.
pub type StoredOverrides = BTreeMap<PluginId, ConfigValues>;

/// Read-modify-write step applied by `ConfigStore::update`.
pub type Updater = Box<dyn FnOnce(&mut StoredOverrides) + Send>;

/// Backing store for config overrides.
///
/// Last writer wins at whole-mapping granularity.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read all overrides.
    async fn load(&self) -> Result<StoredOverrides>;

    /// Apply `updater` to the stored mapping and persist the result.
    async fn update(&self, updater: Updater) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<StoredOverrides>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<StoredOverrides> {
        Ok(lock(&self.values).clone())
    }

    async fn update(&self, updater: Updater) -> Result<()> {
        updater(&mut lock(&self.values));
        Ok(())
    }
}

/// Store backed by one JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    write: tokio::sync::Mutex<()>,
}

impl JsonFileConfigStore {
    /// Create a store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoredOverrides> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) if raw.is_empty() => Ok(StoredOverrides::new()),
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredOverrides::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, values: &StoredOverrides) -> Result<()> {
        let body = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<StoredOverrides> {
        self.read().await
    }

    async fn update(&self, updater: Updater) -> Result<()> {
        let _write = self.write.lock().await;
        let persist = |e: Error| Error::PersistFailed(format!("{}: {e}", self.path.display()));
        let mut values = self.read().await.map_err(persist)?;
        updater(&mut values);
        self.write(&values).await.map_err(persist)?;
        debug!(path = %self.path.display(), plugins = values.len(), "config overrides saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use serde_json::json;

    fn set(id: &str, key: &str, value: Value) -> Updater {
        let id = PluginId::new(id);
        let key = key.to_string();
        Box::new(move |values: &mut StoredOverrides| {
            values.entry(id).or_default().insert(key, value);
        })
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryConfigStore::new();
        store.update(set("foo", "port", json!(80))).await.unwrap();
        let values = store.load().await.unwrap();
        assert_eq!(values["foo"]["port"], json!(80));
    }

    #[tokio::test]
    async fn test_file_store_missing_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("plugins-config.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins-config.json");
        let store = JsonFileConfigStore::new(&path);
        store.update(set("foo", "port", json!(80))).await.unwrap();
        store.update(set("bar", "name", json!("x"))).await.unwrap();

        let reopened = JsonFileConfigStore::new(&path);
        let values = reopened.load().await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["bar"]["name"], json!("x"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = JsonFileConfigStore::new(blocker.join("plugins-config.json"));

        let err = store.update(set("foo", "port", json!(80))).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PersistFailed);
    }
}
