//! Effective plugin configuration.
//!
//! Only values that differ from the declared defaults are stored; reads
//! overlay them on the defaults.

use crate::config::store::{ConfigStore, ConfigValues, StoredOverrides};
use crate::core::{PluginId, Result};
use crate::plugin::model::ConfigFields;
use crate::plugin::runtime::PluginRuntime;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Keep only overrides that are not null and differ from the field default.
pub fn minimize(proposed: ConfigValues, fields: Option<&ConfigFields>) -> ConfigValues {
    proposed
        .into_iter()
        .filter(|(key, value)| {
            if value.is_null() {
                return false;
            }
            let default = fields
                .and_then(|fields| fields.get(key))
                .and_then(|field| field.default_value.as_ref());
            default != Some(value)
        })
        .collect()
}

/// Reads and writes plugin configuration.
pub struct ConfigReconciler {
    runtime: Arc<dyn PluginRuntime>,
    store: Arc<dyn ConfigStore>,
}

impl ConfigReconciler {
    /// Create a reconciler.
    pub fn new(runtime: Arc<dyn PluginRuntime>, store: Arc<dyn ConfigStore>) -> Self {
        Self { runtime, store }
    }

    /// Declared defaults overlaid with stored overrides.
    pub async fn get_plugin_config(&self, id: &PluginId) -> Result<ConfigValues> {
        let mut config: ConfigValues = self
            .runtime
            .config_fields(id)
            .unwrap_or_default()
            .into_iter()
            .map(|(key, field)| (key, field.default_value.unwrap_or(Value::Null)))
            .collect();
        let stored = self.store.load().await?;
        if let Some(overrides) = stored.get(id) {
            config.extend(overrides.clone());
        }
        Ok(config)
    }

    /// Replace the stored overrides of `id` with the minimized `proposed`.
    ///
    /// Returns what was stored; an empty result deletes the entry.
    pub async fn set_plugin_config(&self, id: &PluginId, proposed: ConfigValues) -> Result<ConfigValues> {
        let fields = self.runtime.config_fields(id);
        let minimized = minimize(proposed, fields.as_ref());
        let stored = minimized.clone();
        let key = id.clone();
        self.store
            .update(Box::new(move |values: &mut StoredOverrides| {
                if stored.is_empty() {
                    values.remove(&key);
                } else {
                    values.insert(key, stored);
                }
            }))
            .await?;
        debug!(plugin = %id, overrides = minimized.len(), "plugin config stored");
        Ok(minimized)
    }

    /// Drop all stored overrides of `id`.
    pub async fn forget_plugin(&self, id: &PluginId) -> Result<()> {
        let key = id.clone();
        self.store
            .update(Box::new(move |values: &mut StoredOverrides| {
                values.remove(&key);
            }))
            .await?;
        info!(plugin = %id, "plugin config purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::{JsonFileConfigStore, MemoryConfigStore};
    use crate::core::ErrorCode;
    use crate::plugin::model::ConfigField;
    use crate::testing::FakeRuntime;
    use serde_json::json;

    fn values(value: Value) -> ConfigValues {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn fields() -> ConfigFields {
        let mut fields = ConfigFields::new();
        fields.insert("port".to_string(), ConfigField::with_default(json!(8080)));
        fields.insert("name".to_string(), ConfigField::default());
        fields
    }

    fn reconciler() -> (ConfigReconciler, Arc<MemoryConfigStore>) {
        let runtime = FakeRuntime::new();
        runtime.seed_fields("foo", fields());
        let store = Arc::new(MemoryConfigStore::new());
        (ConfigReconciler::new(runtime, store.clone()), store)
    }

    #[test]
    fn test_minimize_drops_defaults_and_nulls() {
        let fields = fields();
        let kept = minimize(values(json!({"port": 8080, "name": null, "extra": 1})), Some(&fields));
        assert_eq!(Value::Object(kept), json!({"extra": 1}));
    }

    #[test]
    fn test_minimize_is_idempotent() {
        let fields = fields();
        let once = minimize(values(json!({"port": 9000, "name": "x", "debug": null})), Some(&fields));
        let twice = minimize(once.clone(), Some(&fields));
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_get_overlays_defaults() {
        let (reconciler, _) = reconciler();
        let id = PluginId::new("foo");
        assert_eq!(
            Value::Object(reconciler.get_plugin_config(&id).await.unwrap()),
            json!({"port": 8080, "name": null})
        );

        reconciler
            .set_plugin_config(&id, values(json!({"port": 9000})))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(reconciler.get_plugin_config(&id).await.unwrap()),
            json!({"port": 9000, "name": null})
        );
    }

    #[tokio::test]
    async fn test_resetting_to_defaults_deletes_entry() {
        let (reconciler, store) = reconciler();
        let id = PluginId::new("foo");
        reconciler
            .set_plugin_config(&id, values(json!({"port": 9000})))
            .await
            .unwrap();
        assert!(store.load().await.unwrap().contains_key("foo"));

        let stored = reconciler
            .set_plugin_config(&id, values(json!({"port": 8080, "name": null})))
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(!store.load().await.unwrap().contains_key("foo"));
    }

    #[tokio::test]
    async fn test_forget_plugin() {
        let (reconciler, store) = reconciler();
        let id = PluginId::new("foo");
        reconciler
            .set_plugin_config(&id, values(json!({"name": "x"})))
            .await
            .unwrap();
        reconciler.forget_plugin(&id).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = Arc::new(JsonFileConfigStore::new(blocker.join("config.json")));
        let reconciler = ConfigReconciler::new(FakeRuntime::new(), store);

        let err = reconciler
            .set_plugin_config(&PluginId::new("foo"), values(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PersistFailed);
    }
}
