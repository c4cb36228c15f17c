//! Orchestrator Module
//!
//! Plugin installation lifecycle:
//! - Download into staging, atomic publish
//! - Update with stop-then-swap
//! - Bounded, cancellable uninstall

pub mod installer;
pub mod staging;

pub use installer::InstallationOrchestrator;
pub use staging::{remove_plugin_dir, StagingDir};
