//! Remote plugin source interface.
//!
//! Typically a code-hosting API. Transport and metadata parsing live behind
//! this trait.

use crate::core::{Result, Timestamp};
use crate::plugin::model::{api_satisfied, DownloadStatus};
use crate::plugin::version::PluginVersion;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A search hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteCandidate {
    /// Repository reference
    pub repo: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Branch the plugin is published from
    #[serde(default)]
    pub branch: Option<String>,
    /// Popularity
    #[serde(default)]
    pub stars: Option<u32>,
    /// Last push
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl RemoteCandidate {
    /// Create a candidate.
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            description: None,
            branch: None,
            stars: None,
            updated_at: None,
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

/// Repository metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Repository reference
    pub repo: String,
    /// Default branch
    pub default_branch: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

impl RepoInfo {
    /// Create repository metadata on branch `main`.
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            default_branch: "main".to_string(),
            description: None,
        }
    }
}

/// Plugin descriptor as published remotely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    /// Published version
    pub version: PluginVersion,
    /// Host API level it needs
    #[serde(default)]
    pub api_required: Option<u32>,
    /// Flagged by the source as unusable with this host
    #[serde(default)]
    pub bad_api: bool,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

impl RemoteDescriptor {
    /// Create a descriptor.
    pub fn new(version: PluginVersion) -> Self {
        Self {
            version,
            api_required: None,
            bad_api: false,
            description: None,
        }
    }

    /// Set API requirement.
    pub fn with_api_required(mut self, api: u32) -> Self {
        self.api_required = Some(api);
        self
    }

    /// Flag as bad API.
    pub fn with_bad_api(mut self) -> Self {
        self.bad_api = true;
        self
    }

    /// Installable on a host implementing `host_api`.
    pub fn installable_on(&self, host_api: u32) -> bool {
        !self.bad_api && api_satisfied(self.api_required, host_api)
    }

    /// Offerable as an update: must also declare its API requirement.
    pub fn updatable_on(&self, host_api: u32) -> bool {
        self.api_required.is_some() && self.installable_on(host_api)
    }
}

/// What to download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Repository reference
    pub repo: String,
    /// Branch; the default branch when `None`
    pub branch: Option<String>,
    /// Replacing an installed copy
    pub is_update: bool,
}

/// Receives download progress.
pub type ProgressFn<'a> = &'a (dyn Fn(DownloadStatus) + Send + Sync);

/// Remote plugin source.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Lazy search; may fail partway. Per-candidate failures are
    /// `Error::CandidateFailed`, anything else ends the sequence.
    fn search(&self, query: &str) -> BoxStream<'static, Result<RemoteCandidate>>;

    /// Repository metadata.
    async fn repo_info(&self, repo: &str) -> Result<RepoInfo>;

    /// Plugin descriptor published in the repository.
    async fn read_descriptor(&self, info: &RepoInfo) -> Result<RemoteDescriptor>;

    /// Materialize the package into `dest`, an empty directory.
    async fn fetch(&self, request: &FetchRequest, dest: &Path, progress: ProgressFn<'_>) -> Result<()>;
}
