//! Plugin registry.
//!
//! Authoritative set of installed plugins plus the cache of available ones.
//! Every mutation publishes its event while the state lock is held, so all
//! subscribers see one total order of transitions.

use crate::core::sync::lock;
use crate::core::{now, Error, PluginId, Result};
use crate::events::{EventBus, EventSubscription, PluginEvent};
use crate::plugin::locks::{IdentityGuard, IdentityLocks};
use crate::plugin::model::{AvailablePlugin, DownloadStatus, InstalledPlugin};
use crate::plugin::runtime::PluginRuntime;
use crate::remote::{folder_for_repo, normalize_repo};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Default)]
struct RegistryState {
    installed: BTreeMap<PluginId, InstalledPlugin>,
    available: BTreeMap<PluginId, AvailablePlugin>,
}

/// Point-in-time copy of the registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrySnapshot {
    /// Installed plugins, ordered by identity
    pub installed: Vec<InstalledPlugin>,
    /// Available cache, ordered by identity
    pub available: Vec<AvailablePlugin>,
}

/// Plugin registry.
pub struct PluginRegistry {
    state: Mutex<RegistryState>,
    bus: EventBus,
    locks: IdentityLocks,
    runtime: Arc<dyn PluginRuntime>,
    host_api: u32,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new(runtime: Arc<dyn PluginRuntime>, bus: EventBus, host_api: u32) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            bus,
            locks: IdentityLocks::new(),
            runtime,
            host_api,
        }
    }

    /// Create a registry seeded from the runtime.
    pub async fn load(runtime: Arc<dyn PluginRuntime>, bus: EventBus, host_api: u32) -> Result<Self> {
        let installed = runtime.list_installed().await?;
        let available = runtime.list_available_builtins().await?;
        let registry = Self::new(runtime, bus, host_api);
        {
            let mut state = lock(&registry.state);
            for plugin in installed {
                state.installed.insert(plugin.id.clone(), plugin);
            }
            for plugin in available {
                state.available.insert(plugin.id.clone(), plugin);
            }
            info!(
                installed = state.installed.len(),
                available = state.available.len(),
                "plugin registry loaded"
            );
        }
        Ok(registry)
    }

    /// Event source of this registry.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Runtime hosting the plugins.
    pub fn runtime(&self) -> &Arc<dyn PluginRuntime> {
        &self.runtime
    }

    /// Host API level.
    pub fn host_api(&self) -> u32 {
        self.host_api
    }

    /// Installed plugins.
    pub fn installed(&self) -> Vec<InstalledPlugin> {
        lock(&self.state).installed.values().cloned().collect()
    }

    /// Available cache.
    pub fn available(&self) -> Vec<AvailablePlugin> {
        lock(&self.state).available.values().cloned().collect()
    }

    /// Get an installed plugin.
    pub fn get(&self, id: &PluginId) -> Option<InstalledPlugin> {
        lock(&self.state).installed.get(id).cloned()
    }

    /// Whether the identity is installed.
    pub fn is_installed(&self, id: &PluginId) -> bool {
        lock(&self.state).installed.contains_key(id)
    }

    /// Installed plugin count.
    pub fn plugin_count(&self) -> usize {
        lock(&self.state).installed.len()
    }

    /// Repository reference → folder of every plugin downloaded from a repository.
    pub fn repo_folders(&self) -> BTreeMap<String, PluginId> {
        lock(&self.state)
            .installed
            .values()
            .filter_map(|plugin| {
                let repo = plugin.repo()?;
                Some((repo.to_string(), plugin.id.clone()))
            })
            .collect()
    }

    /// Point-in-time copy.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = lock(&self.state);
        Self::snapshot_of(&state)
    }

    /// Snapshot plus a listener registered at the same instant.
    ///
    /// Every transition is either reflected in the snapshot or delivered to
    /// the subscription, never both and never neither.
    pub fn snapshot_and_subscribe(&self) -> (RegistrySnapshot, EventSubscription) {
        let state = lock(&self.state);
        let subscription = self.bus.subscribe();
        (Self::snapshot_of(&state), subscription)
    }

    /// Exclusive access to one identity for a multi-step operation.
    pub async fn lock_identity(&self, id: &PluginId) -> IdentityGuard {
        self.locks.acquire(id).await
    }

    /// Add a freshly installed plugin.
    pub fn insert_installed(&self, plugin: InstalledPlugin) -> Result<()> {
        let mut state = lock(&self.state);
        if state.installed.contains_key(&plugin.id) {
            return Err(Error::AlreadyInstalled(plugin.id.to_string()));
        }
        info!(plugin = %plugin.id, version = %plugin.version(), "plugin installed");
        state.installed.insert(plugin.id.clone(), plugin.clone());
        self.bus.publish(PluginEvent::Installed(plugin));
        Ok(())
    }

    /// Replace the record of an installed plugin, keeping its run state.
    pub fn replace_installed(&self, plugin: InstalledPlugin) -> Result<InstalledPlugin> {
        let mut state = lock(&self.state);
        let current = state
            .installed
            .get_mut(&plugin.id)
            .ok_or_else(|| Error::NotFound(plugin.id.to_string()))?;

        let running = current.running;
        let started_at = current.started_at;
        *current = InstalledPlugin {
            running,
            started_at,
            ..plugin
        };
        let updated = current.clone();
        info!(plugin = %updated.id, version = %updated.version(), "plugin updated");
        self.bus.publish(PluginEvent::Updated(updated.clone()));
        Ok(updated)
    }

    /// Set the enabled flag.
    pub fn set_enabled(&self, id: &PluginId, enabled: bool) -> Result<InstalledPlugin> {
        let mut state = lock(&self.state);
        let plugin = state
            .installed
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if plugin.enabled != enabled {
            plugin.enabled = enabled;
            debug!(plugin = %id, enabled, "plugin enabled flag changed");
            self.bus.publish(PluginEvent::Updated(plugin.clone()));
        }
        Ok(plugin.clone())
    }

    /// Runtime notification: an instance started.
    ///
    /// Ignored for disabled plugins so that `running` always implies `enabled`.
    pub fn plugin_started(&self, id: &PluginId) -> Result<bool> {
        let mut state = lock(&self.state);
        let plugin = state
            .installed
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if !plugin.enabled {
            warn!(plugin = %id, "start reported for disabled plugin, ignored");
            return Ok(false);
        }
        if plugin.running {
            return Ok(false);
        }
        plugin.running = true;
        plugin.started_at = Some(now());
        info!(plugin = %id, "plugin started");
        self.bus.publish(PluginEvent::Started(plugin.clone()));
        Ok(true)
    }

    /// Runtime notification: an instance stopped.
    pub fn plugin_stopped(&self, id: &PluginId) -> Result<bool> {
        let mut state = lock(&self.state);
        let plugin = state
            .installed
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if !plugin.running {
            return Ok(false);
        }
        plugin.running = false;
        plugin.started_at = None;
        info!(plugin = %id, "plugin stopped");
        self.bus.publish(PluginEvent::Stopped(plugin.clone()));
        Ok(true)
    }

    /// Drop an uninstalled plugin.
    pub fn remove(&self, id: &PluginId) -> Result<InstalledPlugin> {
        let mut state = lock(&self.state);
        let removed = state
            .installed
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let available = state.available.get(id).cloned();
        info!(plugin = %id, "plugin uninstalled");
        self.bus.publish(PluginEvent::Uninstalled {
            id: id.clone(),
            available,
        });
        Ok(removed)
    }

    /// Publish download progress; `None` once finished.
    pub fn report_download(&self, id: &PluginId, status: Option<DownloadStatus>) {
        let _state = lock(&self.state);
        self.bus.publish(PluginEvent::DownloadProgress {
            id: id.clone(),
            status,
        });
    }

    /// Replace the available cache wholesale.
    pub fn replace_available(&self, plugins: Vec<AvailablePlugin>) {
        let mut state = lock(&self.state);
        state.available = plugins
            .into_iter()
            .map(|plugin| (plugin.id.clone(), plugin))
            .collect();
        debug!(available = state.available.len(), "available plugins replaced");
        let catalog = state.available.values().cloned().collect();
        self.bus.publish(PluginEvent::CatalogRefreshed(catalog));
    }

    /// Reload the available cache from the runtime's builtins.
    pub async fn refresh_available(&self) -> Result<usize> {
        let plugins = self.runtime.list_available_builtins().await?;
        let count = plugins.len();
        self.replace_available(plugins);
        Ok(count)
    }

    /// Folder of the installed plugin downloaded from `repo`, if any.
    pub fn folder_of_repo(&self, repo: &str) -> Option<PluginId> {
        let wanted = normalize_repo(repo).ok()?;
        let state = lock(&self.state);
        let declared = state.installed.values().find(|plugin| {
            plugin
                .repo()
                .and_then(|declared| normalize_repo(declared).ok())
                .is_some_and(|declared| declared == wanted)
        });
        if let Some(plugin) = declared {
            return Some(plugin.id.clone());
        }
        let id = folder_for_repo(repo).ok()?;
        state.installed.contains_key(&id).then_some(id)
    }

    fn snapshot_of(state: &RegistryState) -> RegistrySnapshot {
        RegistrySnapshot {
            installed: state.installed.values().cloned().collect(),
            available: state.available.values().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("installed", &self.plugin_count())
            .field("host_api", &self.host_api)
            .finish()
    }
}
