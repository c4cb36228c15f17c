//! Staging directories for downloads.
//!
//! A package is materialized under `<plugins>/.staging/<uuid>` and only
//! renamed into the plugins directory once complete.

use crate::core::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A download in progress; removed on drop unless published.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    live: bool,
}

impl StagingDir {
    /// Create a fresh directory under `root`.
    pub async fn create(root: &Path) -> Result<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "staging directory created");
        Ok(Self { path, live: true })
    }

    /// Where the package is written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the package to `target`, replacing any existing folder.
    ///
    /// The old folder is renamed aside first and restored if the swap fails.
    pub async fn publish(mut self, target: &Path) -> Result<()> {
        let aside = self.path.with_extension("old");
        let replaced = match tokio::fs::rename(target, &aside).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = tokio::fs::rename(&self.path, target).await {
            if replaced {
                if let Err(restore) = tokio::fs::rename(&aside, target).await {
                    warn!(target = %target.display(), error = %restore, "could not restore previous plugin folder");
                }
            }
            return Err(e.into());
        }
        self.live = false;
        if replaced {
            remove_plugin_dir(&aside).await?;
        }
        debug!(target = %target.display(), "package published");
        Ok(())
    }

    /// Delete the partial download.
    pub async fn discard(mut self) -> Result<()> {
        self.live = false;
        remove_plugin_dir(&self.path).await
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_blocking(&path));
            }
            Err(_) => remove_blocking(&path),
        }
    }
}

fn remove_blocking(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "staging directory left behind");
        }
    }
}

/// Remove a plugin folder recursively; an absent folder is not an error.
pub async fn remove_plugin_dir(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
