//! Remote Module
//!
//! Access to remotely published plugins:
//! - `RemoteSource` trait (search, metadata, download)
//! - Repository → folder mapping

pub mod folder;
pub mod source;

pub use folder::{folder_for_repo, normalize_repo};
pub use source::{FetchRequest, ProgressFn, RemoteCandidate, RemoteDescriptor, RemoteSource, RepoInfo};
