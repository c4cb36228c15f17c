//! Client view of one plugin in `list_plugins`.

use crate::core::types::changed;
use crate::core::{Field, PluginId, Timestamp};
use crate::plugin::model::{AvailablePlugin, InstalledPlugin};
use crate::stream::ListItem;
use serde::{Deserialize, Serialize};

/// One row of the plugin list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Identity
    pub id: PluginId,
    /// Installed or latest known version
    pub version: String,
    /// Description
    pub description: Option<String>,
    /// Source repository
    pub repo: Option<String>,
    /// Host API level it needs
    pub api_required: Option<u32>,
    /// Declares an API the host cannot satisfy
    pub bad_api: bool,
    /// Present in the plugins directory
    pub installed: bool,
    /// Host should run it
    pub enabled: bool,
    /// When the running instance started
    pub started: Option<Timestamp>,
}

impl PluginEntry {
    /// Row for an installed plugin.
    pub fn from_installed(plugin: &InstalledPlugin) -> Self {
        Self {
            id: plugin.id.clone(),
            version: plugin.version().to_string(),
            description: plugin.manifest.description.clone(),
            repo: plugin.manifest.repo.clone(),
            api_required: plugin.manifest.api_required,
            bad_api: plugin.bad_api,
            installed: true,
            enabled: plugin.enabled,
            started: plugin.started_at,
        }
    }

    /// Row for a plugin that is only available.
    pub fn from_available(plugin: &AvailablePlugin) -> Self {
        Self {
            id: plugin.id.clone(),
            version: plugin.version.to_string(),
            description: plugin.description.clone(),
            repo: plugin.repo.clone(),
            api_required: plugin.api_required,
            bad_api: plugin.bad_api,
            installed: false,
            enabled: false,
            started: None,
        }
    }
}

/// Changed fields of a `PluginEntry`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginEntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub repo: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub api_required: Field<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_api: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub started: Field<Timestamp>,
}

impl PluginEntryPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ListItem for PluginEntry {
    type Key = PluginId;
    type Patch = PluginEntryPatch;

    fn key(&self) -> PluginId {
        self.id.clone()
    }

    fn diff(&self, newer: &Self) -> Option<PluginEntryPatch> {
        let patch = PluginEntryPatch {
            version: changed(&self.version, &newer.version),
            description: Field::change(&self.description, &newer.description),
            repo: Field::change(&self.repo, &newer.repo),
            api_required: Field::change(&self.api_required, &newer.api_required),
            bad_api: changed(&self.bad_api, &newer.bad_api),
            installed: changed(&self.installed, &newer.installed),
            enabled: changed(&self.enabled, &newer.enabled),
            started: Field::change(&self.started, &newer.started),
        };
        (!patch.is_empty()).then_some(patch)
    }

    fn apply(&mut self, patch: &PluginEntryPatch) {
        if let Some(version) = &patch.version {
            self.version = version.clone();
        }
        patch.description.apply_to(&mut self.description);
        patch.repo.apply_to(&mut self.repo);
        patch.api_required.apply_to(&mut self.api_required);
        if let Some(bad_api) = patch.bad_api {
            self.bad_api = bad_api;
        }
        if let Some(installed) = patch.installed {
            self.installed = installed;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        patch.started.apply_to(&mut self.started);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::now;
    use crate::testing::installed;

    #[test]
    fn test_diff_carries_only_changes() {
        let stopped = PluginEntry::from_installed(&installed("foo", "1.0.0").with_enabled(true));
        let mut running = stopped.clone();
        running.started = Some(now());

        let patch = stopped.diff(&running).unwrap();
        assert!(matches!(patch.started, Field::Present(_)));
        assert_eq!(patch.enabled, None);
        assert_eq!(patch.version, None);
    }

    #[test]
    fn test_stop_clears_started() {
        let mut running = PluginEntry::from_installed(&installed("foo", "1.0.0").with_enabled(true));
        running.started = Some(now());
        let stopped = PluginEntry {
            started: None,
            ..running.clone()
        };

        let patch = running.diff(&stopped).unwrap();
        assert_eq!(patch.started, Field::Cleared);

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "started": null }));

        let mut replica = running.clone();
        replica.apply(&patch);
        assert_eq!(replica, stopped);
    }

    #[test]
    fn test_installed_to_available() {
        let plugin = installed("foo", "1.2.0").with_enabled(true);
        let available = AvailablePlugin::new(plugin.id.clone(), plugin.version().clone());

        let from = PluginEntry::from_installed(&plugin);
        let to = PluginEntry::from_available(&available);
        let mut replica = from.clone();
        replica.apply(&from.diff(&to).unwrap());
        assert_eq!(replica, to);
        assert!(!replica.installed);
    }

    #[test]
    fn test_no_diff_for_equal_rows() {
        let entry = PluginEntry::from_installed(&installed("foo", "1.0.0"));
        assert_eq!(entry.diff(&entry.clone()), None);
    }
}
