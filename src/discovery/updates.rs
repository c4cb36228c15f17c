//! Update check for installed plugins.

use crate::core::{PluginId, Result};
use crate::plugin::model::InstalledPlugin;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::version::PluginVersion;
use crate::remote::{RemoteDescriptor, RemoteSource};
use crate::stream::{live_list, ListItem, ListProducer, ListStream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An installed plugin with a newer compatible version published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// Installed identity
    pub id: PluginId,
    /// Repository the update comes from
    pub repo: String,
    /// Published version
    pub version: PluginVersion,
    /// Version on disk
    pub installed_version: PluginVersion,
    pub description: Option<String>,
    pub api_required: Option<u32>,
}

impl UpdateEntry {
    fn new(plugin: &InstalledPlugin, repo: &str, descriptor: RemoteDescriptor) -> Self {
        Self {
            id: plugin.id.clone(),
            repo: repo.to_string(),
            version: descriptor.version,
            installed_version: plugin.version().clone(),
            description: descriptor.description,
            api_required: descriptor.api_required,
        }
    }
}

impl ListItem for UpdateEntry {
    type Key = PluginId;
    type Patch = UpdateEntry;

    fn key(&self) -> PluginId {
        self.id.clone()
    }

    fn diff(&self, newer: &Self) -> Option<UpdateEntry> {
        (self != newer).then(|| newer.clone())
    }

    fn apply(&mut self, patch: &UpdateEntry) {
        *self = patch.clone();
    }
}

/// Whether `descriptor` should be offered over `installed` on `host_api`.
pub fn is_update(installed: &PluginVersion, descriptor: &RemoteDescriptor, host_api: u32) -> bool {
    descriptor.version > *installed && descriptor.updatable_on(host_api)
}

/// Check every installed plugin that came from a repository.
///
/// Emits one `Add` per available update, then `End`.
pub fn check_updates(registry: Arc<PluginRegistry>, remote: Arc<dyn RemoteSource>) -> ListStream<UpdateEntry> {
    let (producer, stream) = live_list(Vec::new());
    tokio::spawn(run_check(registry, remote, producer));
    stream
}

async fn run_check(registry: Arc<PluginRegistry>, remote: Arc<dyn RemoteSource>, producer: ListProducer<UpdateEntry>) {
    let host_api = registry.host_api();
    let mut found = 0;
    for plugin in registry.installed() {
        let Some(repo) = plugin.repo() else {
            continue;
        };
        let lookup = fetch_descriptor(remote.as_ref(), repo);
        tokio::select! {
            _ = producer.closed() => {
                debug!("update check abandoned");
                return;
            }
            result = lookup => match result {
                Ok(descriptor) if is_update(plugin.version(), &descriptor, host_api) => {
                    found += 1;
                    producer.add(UpdateEntry::new(&plugin, repo, descriptor));
                }
                Ok(_) => {}
                Err(e) => warn!(plugin = %plugin.id, repo, error = %e, "update check skipped"),
            },
        }
    }
    info!(updates = found, "update check finished");
    producer.end();
}

async fn fetch_descriptor(remote: &dyn RemoteSource, repo: &str) -> Result<RemoteDescriptor> {
    let info = remote.repo_info(repo).await?;
    remote.read_descriptor(&info).await
}
