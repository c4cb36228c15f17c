//! Config Module
//!
//! Per-plugin configuration overrides:
//! - Override stores (memory, JSON file)
//! - Default-aware reconciler

pub mod reconciler;
pub mod store;

pub use reconciler::{minimize, ConfigReconciler};
pub use store::{ConfigStore, ConfigValues, JsonFileConfigStore, MemoryConfigStore, StoredOverrides, Updater};
