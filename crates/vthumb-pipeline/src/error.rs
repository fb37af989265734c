//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;
use vthumb_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal pipeline errors. Per-frame decode misses are not errors; the
/// session skips those timestamps and keeps going.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    pub fn write_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailed { path: path.into(), reason: reason.into() }
    }
}
