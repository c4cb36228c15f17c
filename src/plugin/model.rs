//! Plugin records.
//!
//! What the registry knows about installed and available plugins.

use crate::core::{PluginId, Timestamp};
use crate::plugin::version::PluginVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configuration field declared by a plugin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    /// Value used when nothing is stored
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    /// Human label
    #[serde(default)]
    pub label: Option<String>,
    /// Help text
    #[serde(default)]
    pub helper: Option<String>,
}

impl ConfigField {
    /// Create a field with a default value.
    pub fn with_default(value: serde_json::Value) -> Self {
        Self {
            default_value: Some(value),
            ..Default::default()
        }
    }
}

/// Declared fields keyed by field name.
pub type ConfigFields = BTreeMap<String, ConfigField>;

/// Whether a declared API requirement is met by the host.
pub fn api_satisfied(api_required: Option<u32>, host_api: u32) -> bool {
    api_required.map_or(true, |required| required <= host_api)
}

/// Descriptor read from a plugin folder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Version
    pub version: PluginVersion,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Host API level the plugin needs
    #[serde(default)]
    pub api_required: Option<u32>,
    /// Repository the plugin was downloaded from
    #[serde(default)]
    pub repo: Option<String>,
    /// Declared configuration fields
    #[serde(default)]
    pub config: ConfigFields,
}

impl PluginManifest {
    /// Create a manifest.
    pub fn new(version: PluginVersion) -> Self {
        Self {
            version,
            description: None,
            api_required: None,
            repo: None,
            config: ConfigFields::new(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Set the required API level.
    pub fn with_api_required(mut self, api: u32) -> Self {
        self.api_required = Some(api);
        self
    }

    /// Set source repository.
    pub fn with_repo(mut self, repo: &str) -> Self {
        self.repo = Some(repo.to_string());
        self
    }

    /// Declare a config field.
    pub fn with_field(mut self, key: &str, field: ConfigField) -> Self {
        self.config.insert(key.to_string(), field);
        self
    }
}

/// A plugin present in the plugins directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    /// Identity (folder name)
    pub id: PluginId,
    /// Descriptor
    pub manifest: PluginManifest,
    /// Whether the host should run it
    pub enabled: bool,
    /// Whether an instance is currently running
    pub running: bool,
    /// When the running instance started
    pub started_at: Option<Timestamp>,
    /// Declares an API the host cannot satisfy
    pub bad_api: bool,
}

impl InstalledPlugin {
    /// Create a stopped record.
    pub fn new(id: PluginId, manifest: PluginManifest, host_api: u32) -> Self {
        let bad_api = !api_satisfied(manifest.api_required, host_api);
        Self {
            id,
            manifest,
            enabled: false,
            running: false,
            started_at: None,
            bad_api,
        }
    }

    /// Set enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Installed version.
    pub fn version(&self) -> &PluginVersion {
        &self.manifest.version
    }

    /// Source repository, if downloaded from one.
    pub fn repo(&self) -> Option<&str> {
        self.manifest.repo.as_deref()
    }
}

/// A plugin known from a remote or builtin source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvailablePlugin {
    /// Identity it would be installed under
    pub id: PluginId,
    /// Repository reference
    #[serde(default)]
    pub repo: Option<String>,
    /// Latest known version
    pub version: PluginVersion,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Host API level it needs
    #[serde(default)]
    pub api_required: Option<u32>,
    /// Declares an API the host cannot satisfy
    #[serde(default)]
    pub bad_api: bool,
}

impl AvailablePlugin {
    /// Create an available entry.
    pub fn new(id: PluginId, version: PluginVersion) -> Self {
        Self {
            id,
            repo: None,
            version,
            description: None,
            api_required: None,
            bad_api: false,
        }
    }

    /// Set repository.
    pub fn with_repo(mut self, repo: &str) -> Self {
        self.repo = Some(repo.to_string());
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Set API requirement and recompute compatibility.
    pub fn with_api_required(mut self, api: u32, host_api: u32) -> Self {
        self.api_required = Some(api);
        self.bad_api = !api_satisfied(self.api_required, host_api);
        self
    }
}

/// Progress of a package download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum DownloadStatus {
    /// Request issued
    Starting,
    /// Bytes arriving
    Receiving {
        received_bytes: u64,
        total_bytes: Option<u64>,
    },
    /// Moving the package into place
    Publishing,
}
