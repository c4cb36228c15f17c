//! Live List Module
//!
//! Snapshot followed by an ordered, cancellable feed of list operations:
//! - `ListItem` / `ListOp` data model
//! - `live_list` producer and stream halves
//! - `ListMirror` receiver-side replica

pub mod list;
pub mod mirror;
pub mod op;

pub use list::{live_list, ListProducer, ListStream};
pub use mirror::{ListMirror, Termination};
pub use op::{ListItem, ListOp};
