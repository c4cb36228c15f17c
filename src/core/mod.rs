//! Core utilities and common types for plugyard.

pub mod config;
pub mod error;
pub(crate) mod sync;
pub mod types;

pub use config::{HostConfig, UninstallPolicy};
pub use error::{Error, ErrorCode, Result};
pub use types::*;
