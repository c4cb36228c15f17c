//! Error types for plugyard.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for plugyard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plugyard operations.
#[derive(Error, Debug)]
pub enum Error {
    // Identity errors
    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Compatibility errors
    #[error("Plugin {id} is incompatible with host API {host_api}")]
    Incompatible { id: String, host_api: u32 },

    // Installation errors
    #[error("Download failed for {id}: {reason}")]
    DownloadFailed { id: String, reason: String },

    #[error("Plugin {id} still running after {attempts} stop attempts")]
    StillRunning { id: String, attempts: u32 },

    // Remote errors
    #[error("Remote source failed: {0}")]
    RemoteFailed(String),

    #[error("Candidate {repo} could not be resolved: {reason}")]
    CandidateFailed { repo: String, reason: String },

    // Persistence errors
    #[error("Config persistence failed: {0}")]
    PersistFailed(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable machine-readable error codes reported to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyInstalled,
    InvalidRequest,
    Incompatible,
    DownloadFailed,
    StillRunning,
    RemoteFailed,
    PersistFailed,
    Io,
    Internal,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::AlreadyInstalled => "already_installed",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Incompatible => "incompatible",
            ErrorCode::DownloadFailed => "download_failed",
            ErrorCode::StillRunning => "still_running",
            ErrorCode::RemoteFailed => "remote_failed",
            ErrorCode::PersistFailed => "persist_failed",
            ErrorCode::Io => "io",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::AlreadyInstalled(_) => ErrorCode::AlreadyInstalled,
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::Incompatible { .. } => ErrorCode::Incompatible,
            Error::DownloadFailed { .. } => ErrorCode::DownloadFailed,
            Error::StillRunning { .. } => ErrorCode::StillRunning,
            Error::RemoteFailed(_) | Error::CandidateFailed { .. } => ErrorCode::RemoteFailed,
            Error::PersistFailed(_) => ErrorCode::PersistFailed,
            Error::SerializationError(_) | Error::Internal(_) => ErrorCode::Internal,
            Error::Io(_) => ErrorCode::Io,
        }
    }

    /// Whether the failure is local to one item of a sequence.
    ///
    /// Discovery loops skip transient errors and keep going.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CandidateFailed { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
