//! Plugin service.
//!
//! The client-facing surface: live lists plus the plugin management calls.
//! Identities coming from clients are validated here.

use crate::api::types::{PluginSettings, SetPluginRequest, UninstallRequest};
use crate::config::{ConfigReconciler, ConfigStore};
use crate::core::{Error, HostConfig, PluginId, Result};
use crate::discovery::{check_updates, OnlineDiscovery, OnlineEntry, UpdateEntry};
use crate::events::EventBus;
use crate::orchestrator::InstallationOrchestrator;
use crate::plugin::entry::PluginEntry;
use crate::plugin::feed::watch_plugins;
use crate::plugin::model::InstalledPlugin;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::runtime::PluginRuntime;
use crate::remote::RemoteSource;
use crate::stream::ListStream;
use std::sync::Arc;
use tracing::info;

/// Plugin management service.
pub struct PluginService {
    registry: Arc<PluginRegistry>,
    remote: Arc<dyn RemoteSource>,
    reconciler: ConfigReconciler,
    orchestrator: InstallationOrchestrator,
    discovery: OnlineDiscovery,
}

impl PluginService {
    /// Load installed plugins from `runtime` and build the service.
    pub async fn start(
        config: HostConfig,
        runtime: Arc<dyn PluginRuntime>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        let registry = PluginRegistry::load(runtime, EventBus::new(), config.host_api).await?;
        info!(
            plugins_dir = %config.plugins_dir.display(),
            host_api = config.host_api,
            "plugin service started"
        );
        Ok(Self::new(config, Arc::new(registry), remote, store))
    }

    /// Build the service around an existing registry.
    pub fn new(
        config: HostConfig,
        registry: Arc<PluginRegistry>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        let reconciler = ConfigReconciler::new(registry.runtime().clone(), store);
        let orchestrator = InstallationOrchestrator::new(registry.clone(), remote.clone(), config);
        let discovery = OnlineDiscovery::new(registry.clone(), remote.clone());
        Self {
            registry,
            remote,
            reconciler,
            orchestrator,
            discovery,
        }
    }

    /// The registry behind this service.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Installed plugins plus available ones, kept live.
    pub fn list_plugins(&self) -> ListStream<PluginEntry> {
        watch_plugins(&self.registry)
    }

    /// Compatible updates of installed plugins; ends after one pass.
    pub fn list_plugin_updates(&self) -> ListStream<UpdateEntry> {
        check_updates(self.registry.clone(), self.remote.clone())
    }

    /// Enabled flag and effective configuration.
    pub async fn get_plugin(&self, id: &str) -> Result<PluginSettings> {
        let id = PluginId::parse(id)?;
        let enabled = match self.registry.get(&id) {
            Some(plugin) => plugin.enabled,
            None if self.registry.available().iter().any(|p| p.id == id) => false,
            None => return Err(Error::NotFound(id.to_string())),
        };
        let config = self.reconciler.get_plugin_config(&id).await?;
        Ok(PluginSettings { enabled, config })
    }

    /// Apply the fields present in `request`.
    pub async fn set_plugin(&self, request: SetPluginRequest) -> Result<()> {
        let id = PluginId::parse(&request.id)?;
        if let Some(enabled) = request.enabled {
            self.orchestrator.set_enabled(&id, enabled).await?;
        }
        if let Some(config) = request.config {
            self.reconciler.set_plugin_config(&id, config).await?;
        }
        Ok(())
    }

    /// Search remotely published plugins.
    pub fn search_online(&self, text: &str) -> ListStream<OnlineEntry> {
        self.discovery.search(text)
    }

    /// Install from a repository.
    pub async fn install(&self, repo: &str, branch: Option<&str>) -> Result<InstalledPlugin> {
        self.orchestrator.install(repo, branch).await
    }

    /// Update the plugin installed from a repository.
    pub async fn update(&self, repo: &str, branch: Option<&str>) -> Result<InstalledPlugin> {
        self.orchestrator.update(repo, branch).await
    }

    /// Stop and remove a plugin.
    pub async fn uninstall(&self, request: UninstallRequest) -> Result<()> {
        let id = PluginId::parse(&request.id)?;
        self.orchestrator.uninstall(&id).await?;
        if request.purge_config {
            self.reconciler.forget_plugin(&id).await?;
        }
        Ok(())
    }

    /// Reload the available plugins bundled with the host.
    pub async fn refresh_available(&self) -> Result<usize> {
        self.registry.refresh_available().await
    }
}
