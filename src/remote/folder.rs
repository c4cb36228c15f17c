//! Repository reference → storage folder mapping.
//!
//! Downloads are placed with this mapping and discovery correlates with it,
//! so the two sides never drift apart.

use crate::core::{Error, PluginId, Result};

/// Canonical `owner/name` form of a repository reference.
///
/// Accepts `owner/name`, `owner/name.git` and URLs ending in either.
pub fn normalize_repo(repo: &str) -> Result<String> {
    let trimmed = repo.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => Err(Error::InvalidRequest("empty repository reference".to_string())),
        [name] => Ok((*name).to_string()),
        [.., owner, name] => Ok(format!("{owner}/{name}")),
    }
}

/// Folder a plugin downloaded from `repo` is installed into.
pub fn folder_for_repo(repo: &str) -> Result<PluginId> {
    let normalized = normalize_repo(repo)?;
    PluginId::parse(&normalized.replace('/', "-"))
        .map_err(|_| Error::InvalidRequest(format!("invalid repository reference: {repo}")))
}
