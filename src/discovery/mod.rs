//! Discovery Module
//!
//! Finding plugins that are not installed, or newer than installed:
//! - Live online search
//! - Update check

pub mod online;
pub mod updates;

pub use online::{OnlineDiscovery, OnlineEntry, OnlineEntryPatch};
pub use updates::{check_updates, is_update, UpdateEntry};
