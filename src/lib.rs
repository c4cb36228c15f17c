//! # plugyard - Plugin Registry and Installer
//!
//! Manages the plugins of a host application:
//! - **Registry**: installed and available plugins, lifecycle events
//! - **Live lists**: snapshot-then-delta streams that clients mirror
//! - **Orchestrator**: download, atomic publish, update, uninstall
//! - **Discovery**: online search and update checks
//! - **Config**: per-plugin overrides stored relative to declared defaults
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plugyard::api::PluginService;
//! use plugyard::config::MemoryConfigStore;
//! use plugyard::core::HostConfig;
//! # use plugyard::plugin::PluginRuntime;
//! # use plugyard::remote::RemoteSource;
//! # use std::sync::Arc;
//!
//! # async fn run(runtime: Arc<dyn PluginRuntime>, remote: Arc<dyn RemoteSource>) -> plugyard::Result<()> {
//! let service = PluginService::start(
//!     HostConfig::default(),
//!     runtime,
//!     remote,
//!     Arc::new(MemoryConfigStore::new()),
//! )
//! .await?;
//!
//! let mut plugins = service.list_plugins();
//! println!("{} plugins", plugins.snapshot().len());
//! while let Some(op) = plugins.next_op().await {
//!     println!("{op:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod discovery;
pub mod events;
pub mod monitoring;
pub mod orchestrator;
pub mod plugin;
pub mod remote;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use core::error::{Error, Result};
