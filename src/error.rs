//! Error types for the Atelier generation and asset loading core.
//!
//! Every [`ApiError`] maps to exactly one [`ErrorKind`]. The kind is what retry
//! classification, task failure reporting and telemetry look at; the variant
//! carries the detail.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Machine-checkable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeouts, connection resets, 5xx-equivalent statuses. Retryable.
    Transport,
    /// 401/403-equivalent. Never retried.
    Authorization,
    /// The renderer cannot support the asset or format on this device.
    Capability,
    /// The remote job itself reported failure, or the service refused it.
    RemoteJob,
    /// Invalid local configuration.
    Configuration,
    /// Malformed input or payload (request validation, corrupt asset).
    Validation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Capability => "capability",
            ErrorKind::RemoteJob => "remote_job",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
        }
    }

    /// Only transport problems are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage-related errors (telemetry journal)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt journal record: {0}")]
    CorruptRecord(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Errors surfaced by the generation service client, the retry policy and the
/// asset loader's collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    #[error("Renderer capability missing: {0}")]
    Capability(String),

    #[error("Generation job failed: {0}")]
    RemoteJob(String),

    #[error("Generation service rejected request: {0}")]
    Rejected(String),

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("Renderer rejected asset: {0}")]
    RendererRejected(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) | ApiError::Timeout(_) => ErrorKind::Transport,
            ApiError::Unauthorized(_) => ErrorKind::Authorization,
            ApiError::Capability(_) => ErrorKind::Capability,
            ApiError::RemoteJob(_) | ApiError::Rejected(_) => ErrorKind::RemoteJob,
            ApiError::ConfigError(_) | ApiError::StorageError(_) => ErrorKind::Configuration,
            ApiError::InvalidRequest(_)
            | ApiError::InvalidAsset(_)
            | ApiError::AssetUnavailable(_)
            | ApiError::RendererRejected(_) => ErrorKind::Validation,
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transport => {
                "The generation service is unreachable right now. Check your connection and try again."
                    .to_string()
            }
            ErrorKind::Authorization => {
                "You are not signed in or your access has expired. Sign in again to continue."
                    .to_string()
            }
            ErrorKind::Capability => {
                "This device cannot display 3D models of this kind.".to_string()
            }
            ErrorKind::RemoteJob => {
                "The AI could not produce a result. You can start a new generation.".to_string()
            }
            ErrorKind::Configuration | ErrorKind::Validation => self.to_string(),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
