//! Host configuration.
//!
//! Loaded from JSON; every field has a default.

use crate::core::Result;
use crate::monitoring::LoggerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host-side settings for the plugin subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory holding one folder per installed plugin
    pub plugins_dir: PathBuf,
    /// Plugin API level implemented by the host
    pub host_api: u32,
    /// Whether freshly installed plugins start enabled
    pub enable_on_install: bool,
    /// Stop-before-delete policy
    pub uninstall: UninstallPolicy,
    /// Logging
    pub logging: LoggerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from("plugins"),
            host_api: 1,
            enable_on_install: false,
            uninstall: UninstallPolicy::default(),
            logging: LoggerConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Set the plugins directory.
    pub fn with_plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = dir.into();
        self
    }

    /// Set the host API level.
    pub fn with_host_api(mut self, host_api: u32) -> Self {
        self.host_api = host_api;
        self
    }

    /// Set the uninstall policy.
    pub fn with_uninstall(mut self, uninstall: UninstallPolicy) -> Self {
        self.uninstall = uninstall;
        self
    }

    /// Staging area for downloads, on the same file system as the plugins.
    pub fn staging_dir(&self) -> PathBuf {
        self.plugins_dir.join(".staging")
    }
}

/// How uninstall waits for a running plugin to stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UninstallPolicy {
    /// Pause between stop checks, in milliseconds
    pub backoff_ms: u64,
    /// Give up after this many checks; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for UninstallPolicy {
    fn default() -> Self {
        Self {
            backoff_ms: 500,
            max_attempts: Some(120),
        }
    }
}

impl UninstallPolicy {
    /// Backoff as a duration.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
