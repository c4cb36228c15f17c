//! Plugin runtime interface.
//!
//! The host side that actually loads and runs plugins. plugyard only drives
//! its lifecycle; start/stop notifications flow back through
//! `PluginRegistry::plugin_started` and `PluginRegistry::plugin_stopped`.

use crate::core::{PluginId, Result};
use crate::plugin::model::{AvailablePlugin, ConfigFields, InstalledPlugin, PluginManifest};
use async_trait::async_trait;
use std::path::Path;

/// Name of the descriptor file inside a plugin folder.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Runtime that hosts plugin instances.
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    /// Plugins present on disk.
    async fn list_installed(&self) -> Result<Vec<InstalledPlugin>>;

    /// Plugins bundled with the host but not installed.
    async fn list_available_builtins(&self) -> Result<Vec<AvailablePlugin>> {
        Ok(Vec::new())
    }

    /// Whether an instance of the plugin is running.
    fn is_running(&self, id: &PluginId) -> bool;

    /// Ask the runtime to start or stop the plugin.
    ///
    /// Must not wait for the instance to actually stop.
    fn set_enabled(&self, id: &PluginId, enabled: bool);

    /// Config fields the plugin declares, if it is known.
    fn config_fields(&self, id: &PluginId) -> Option<ConfigFields>;

    /// Read the descriptor of the plugin folder at `path`.
    async fn read_manifest(&self, path: &Path) -> Result<PluginManifest> {
        read_manifest_dir(path).await
    }
}

/// Read `plugin.json` from a plugin folder.
pub async fn read_manifest_dir(dir: &Path) -> Result<PluginManifest> {
    let raw = tokio::fs::read(dir.join(MANIFEST_FILE)).await?;
    Ok(serde_json::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use crate::plugin::version::PluginVersion;

    #[tokio::test]
    async fn test_read_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version": "0.3.1", "description": "greets"}"#,
        )
        .unwrap();

        let manifest = read_manifest_dir(dir.path()).await.unwrap();
        assert_eq!(manifest.version, PluginVersion::new(0, 3, 1));
        assert_eq!(manifest.description.as_deref(), Some("greets"));
    }

    #[tokio::test]
    async fn test_read_manifest_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest_dir(dir.path()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Io);
    }

    #[tokio::test]
    async fn test_read_manifest_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{").unwrap();
        let err = read_manifest_dir(dir.path()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
    }
}
