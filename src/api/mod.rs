//! API Module
//!
//! Client-facing plugin service:
//! - Live plugin, update and search lists
//! - Settings, install, update, uninstall

pub mod service;
pub mod types;

pub use service::PluginService;
pub use types::{PluginSettings, SetPluginRequest, UninstallRequest};
