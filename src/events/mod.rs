//! Events Module
//!
//! Typed lifecycle events and the bus that carries them:
//! - `PluginEvent` payloads
//! - `EventBus` with per-subscriber queues

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventSubscription};
pub use event::{EventKind, PluginEvent};
