//! Plugin Module
//!
//! Installed and available plugins:
//! - Plugin records and versions
//! - Runtime interface
//! - Registry with per-identity locks
//! - Live plugin list

pub mod entry;
pub mod feed;
pub mod locks;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod version;

pub use entry::{PluginEntry, PluginEntryPatch};
pub use feed::watch_plugins;
pub use locks::{IdentityGuard, IdentityLocks};
pub use model::{
    api_satisfied, AvailablePlugin, ConfigField, ConfigFields, DownloadStatus, InstalledPlugin, PluginManifest,
};
pub use registry::{PluginRegistry, RegistrySnapshot};
pub use runtime::{read_manifest_dir, PluginRuntime, MANIFEST_FILE};
pub use version::PluginVersion;
