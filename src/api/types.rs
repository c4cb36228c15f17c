//! Request and response types of the plugin service.

use crate::config::ConfigValues;
use serde::{Deserialize, Serialize};

/// Current settings of one plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Host should run it
    pub enabled: bool,
    /// Effective configuration
    pub config: ConfigValues,
}

/// Change a plugin's settings. Omitted fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPluginRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigValues>,
}

impl SetPluginRequest {
    /// Request that changes nothing yet.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Set enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ConfigValues) -> Self {
        self.config = Some(config);
        self
    }
}

/// Remove a plugin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UninstallRequest {
    pub id: String,
    /// Also drop its stored configuration
    #[serde(default)]
    pub purge_config: bool,
}

impl UninstallRequest {
    /// Uninstall keeping the stored configuration.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            purge_config: false,
        }
    }

    /// Drop stored configuration too.
    pub fn purging_config(mut self) -> Self {
        self.purge_config = true;
        self
    }
}
