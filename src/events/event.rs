//! Typed plugin lifecycle events.

use crate::core::PluginId;
use crate::plugin::model::{AvailablePlugin, DownloadStatus, InstalledPlugin};
use serde::{Deserialize, Serialize};

/// Event kind, for filtering and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Installed,
    Started,
    Stopped,
    Updated,
    Uninstalled,
    DownloadProgress,
    CatalogRefreshed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Installed => "installed",
            EventKind::Started => "started",
            EventKind::Stopped => "stopped",
            EventKind::Updated => "updated",
            EventKind::Uninstalled => "uninstalled",
            EventKind::DownloadProgress => "download_progress",
            EventKind::CatalogRefreshed => "catalog_refreshed",
        };
        f.write_str(name)
    }
}

/// A lifecycle transition published by the registry.
///
/// Records are carried by value as they were right after the transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum PluginEvent {
    /// A plugin was installed
    Installed(InstalledPlugin),
    /// A plugin instance started
    Started(InstalledPlugin),
    /// A plugin instance stopped
    Stopped(InstalledPlugin),
    /// Record changed (new version, enabled flag)
    Updated(InstalledPlugin),
    /// A plugin was removed; `available` is what the identity falls back to
    Uninstalled {
        id: PluginId,
        available: Option<AvailablePlugin>,
    },
    /// Download progress; `None` once the download is over
    DownloadProgress {
        id: PluginId,
        status: Option<DownloadStatus>,
    },
    /// The available cache was replaced
    CatalogRefreshed(Vec<AvailablePlugin>),
}

impl PluginEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            PluginEvent::Installed(_) => EventKind::Installed,
            PluginEvent::Started(_) => EventKind::Started,
            PluginEvent::Stopped(_) => EventKind::Stopped,
            PluginEvent::Updated(_) => EventKind::Updated,
            PluginEvent::Uninstalled { .. } => EventKind::Uninstalled,
            PluginEvent::DownloadProgress { .. } => EventKind::DownloadProgress,
            PluginEvent::CatalogRefreshed(_) => EventKind::CatalogRefreshed,
        }
    }

    /// Identity the event is about, if it is about a single plugin.
    pub fn plugin_id(&self) -> Option<&PluginId> {
        match self {
            PluginEvent::Installed(p)
            | PluginEvent::Started(p)
            | PluginEvent::Stopped(p)
            | PluginEvent::Updated(p) => Some(&p.id),
            PluginEvent::Uninstalled { id, .. } | PluginEvent::DownloadProgress { id, .. } => Some(id),
            PluginEvent::CatalogRefreshed(_) => None,
        }
    }
}
