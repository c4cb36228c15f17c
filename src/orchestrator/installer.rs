//! Installation orchestrator.
//!
//! Drives a plugin through `Absent → Downloading → Installed → Uninstalling
//! → Absent`. Every operation holds the identity lock for its whole duration,
//! so operations on one plugin never interleave.

use crate::core::{Error, HostConfig, PluginId, Result};
use crate::orchestrator::staging::{remove_plugin_dir, StagingDir};
use crate::plugin::model::{DownloadStatus, InstalledPlugin};
use crate::plugin::registry::PluginRegistry;
use crate::remote::{folder_for_repo, FetchRequest, RemoteSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installs, updates and removes plugins.
pub struct InstallationOrchestrator {
    registry: Arc<PluginRegistry>,
    remote: Arc<dyn RemoteSource>,
    config: HostConfig,
}

impl InstallationOrchestrator {
    /// Create an orchestrator.
    pub fn new(registry: Arc<PluginRegistry>, remote: Arc<dyn RemoteSource>, config: HostConfig) -> Self {
        Self {
            registry,
            remote,
            config,
        }
    }

    /// Folder of plugin `id`.
    pub fn plugin_dir(&self, id: &PluginId) -> PathBuf {
        self.config.plugins_dir.join(id.as_str())
    }

    /// Install a plugin that is not installed yet.
    pub async fn install(&self, repo: &str, branch: Option<&str>) -> Result<InstalledPlugin> {
        self.download(repo, branch, false).await
    }

    /// Replace an installed plugin with the published version.
    pub async fn update(&self, repo: &str, branch: Option<&str>) -> Result<InstalledPlugin> {
        self.download(repo, branch, true).await
    }

    /// Download `repo` and publish it into the plugins directory.
    ///
    /// On failure nothing changes on disk or in the registry.
    pub async fn download(&self, repo: &str, branch: Option<&str>, is_update: bool) -> Result<InstalledPlugin> {
        let id = if is_update {
            self.registry
                .folder_of_repo(repo)
                .ok_or_else(|| Error::NotFound(repo.to_string()))?
        } else {
            folder_for_repo(repo)?
        };

        let _guard = self.registry.lock_identity(&id).await;
        let current = self.registry.get(&id);
        match (&current, is_update) {
            (Some(_), false) => return Err(Error::AlreadyInstalled(id.to_string())),
            (None, true) => return Err(Error::NotFound(id.to_string())),
            _ => {}
        }

        info!(plugin = %id, repo, is_update, "download started");
        let reset = ProgressReset {
            registry: &self.registry,
            id: &id,
        };
        let result = self.fetch_and_publish(&id, repo, branch, current).await;
        drop(reset);
        match &result {
            Ok(plugin) => info!(plugin = %id, version = %plugin.version(), "download finished"),
            Err(e) => warn!(plugin = %id, error = %e, "download failed"),
        }
        result
    }

    async fn fetch_and_publish(
        &self,
        id: &PluginId,
        repo: &str,
        branch: Option<&str>,
        current: Option<InstalledPlugin>,
    ) -> Result<InstalledPlugin> {
        let host_api = self.registry.host_api();
        let info = self
            .remote
            .repo_info(repo)
            .await
            .map_err(|e| download_failed(id, e))?;
        let descriptor = self
            .remote
            .read_descriptor(&info)
            .await
            .map_err(|e| download_failed(id, e))?;
        if !descriptor.installable_on(host_api) {
            return Err(Error::Incompatible {
                id: id.to_string(),
                host_api,
            });
        }

        let request = FetchRequest {
            repo: repo.to_string(),
            branch: Some(branch.map_or(info.default_branch, str::to_string)),
            is_update: current.is_some(),
        };
        let progress = |status: DownloadStatus| self.registry.report_download(id, Some(status));
        let staging = StagingDir::create(&self.config.staging_dir())
            .await
            .map_err(|e| download_failed(id, e))?;
        if let Err(e) = self.remote.fetch(&request, staging.path(), &progress).await {
            discard(staging).await;
            return Err(download_failed(id, e));
        }
        let mut manifest = match self.registry.runtime().read_manifest(staging.path()).await {
            Ok(manifest) => manifest,
            Err(e) => {
                discard(staging).await;
                return Err(download_failed(id, e));
            }
        };
        manifest.repo.get_or_insert_with(|| repo.to_string());
        progress(DownloadStatus::Publishing);

        let fresh = InstalledPlugin::new(id.clone(), manifest, host_api);
        match current {
            Some(previous) => {
                let swapped = match self.stop_and_wait(id).await {
                    Ok(_) => self.swap_in(staging, fresh).await,
                    Err(e) => {
                        discard(staging).await;
                        Err(e)
                    }
                };
                // Whatever happened, the plugin keeps the enabled flag it had.
                if previous.enabled {
                    self.apply_enabled(id, true)?;
                }
                swapped?;
            }
            None => {
                staging
                    .publish(&self.plugin_dir(id))
                    .await
                    .map_err(|e| download_failed(id, e))?;
                self.registry.insert_installed(fresh)?;
                if self.config.enable_on_install {
                    self.apply_enabled(id, true)?;
                }
            }
        }
        self.registry
            .get(id)
            .ok_or_else(|| Error::Internal(format!("{id} vanished after publish")))
    }

    /// Publish over the stopped plugin's folder and record the new version.
    async fn swap_in(&self, staging: StagingDir, fresh: InstalledPlugin) -> Result<()> {
        staging
            .publish(&self.plugin_dir(&fresh.id))
            .await
            .map_err(|e| download_failed(&fresh.id, e))?;
        self.registry.replace_installed(fresh)?;
        Ok(())
    }

    /// Toggle `enabled` and ask the runtime to start or stop the plugin.
    ///
    /// Does not wait for a stop to take effect.
    pub async fn set_enabled(&self, id: &PluginId, enabled: bool) -> Result<InstalledPlugin> {
        let _guard = self.registry.lock_identity(id).await;
        let plugin = self.apply_enabled(id, enabled)?;
        info!(plugin = %id, enabled, "plugin enabled flag set");
        Ok(plugin)
    }

    /// Stop the plugin, delete its folder and forget it.
    ///
    /// Dropping the returned future while waiting for the stop deletes
    /// nothing.
    pub async fn uninstall(&self, id: &PluginId) -> Result<InstalledPlugin> {
        let _guard = self.registry.lock_identity(id).await;
        if !self.registry.is_installed(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        info!(plugin = %id, "uninstall started");
        self.stop_and_wait(id).await?;
        remove_plugin_dir(&self.plugin_dir(id)).await?;
        self.registry.remove(id)
    }

    /// Disable the plugin and poll until the runtime reports it stopped.
    ///
    /// Returns how many polls found it still running.
    async fn stop_and_wait(&self, id: &PluginId) -> Result<u32> {
        let policy = &self.config.uninstall;
        let runtime = self.registry.runtime();
        self.apply_enabled(id, false)?;

        let mut attempts = 0;
        while runtime.is_running(id) {
            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(plugin = %id, attempts, "plugin did not stop");
                return Err(Error::StillRunning {
                    id: id.to_string(),
                    attempts,
                });
            }
            attempts += 1;
            debug!(plugin = %id, attempts, "waiting for plugin to stop");
            self.apply_enabled(id, false)?;
            tokio::time::sleep(policy.backoff()).await;
        }
        Ok(attempts)
    }

    fn apply_enabled(&self, id: &PluginId, enabled: bool) -> Result<InstalledPlugin> {
        let plugin = self.registry.set_enabled(id, enabled)?;
        self.registry.runtime().set_enabled(id, enabled);
        Ok(plugin)
    }
}

/// Clears the reported download status when the download ends, including
/// when the download future is dropped.
struct ProgressReset<'a> {
    registry: &'a PluginRegistry,
    id: &'a PluginId,
}

impl Drop for ProgressReset<'_> {
    fn drop(&mut self) {
        self.registry.report_download(self.id, None);
    }
}

async fn discard(staging: StagingDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.discard().await {
        warn!(path = %path.display(), error = %e, "partial download left behind");
    }
}

fn download_failed(id: &PluginId, err: Error) -> Error {
    match err {
        Error::NotFound(_) | Error::Incompatible { .. } => err,
        other => Error::DownloadFailed {
            id: id.to_string(),
            reason: other.to_string(),
        },
    }
}
