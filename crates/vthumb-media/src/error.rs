//! Error types for media analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding or analyzing frames.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to open video {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Metric computation failed: {0}")]
    Metric(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an open failure for the given path.
    pub fn open_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OpenFailed { path: path.into(), reason: reason.into() }
    }

    /// Create a decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a detection failure.
    pub fn detection(message: impl Into<String>) -> Self {
        Self::Detection(message.into())
    }

    /// Create a metric computation failure.
    pub fn metric(message: impl Into<String>) -> Self {
        Self::Metric(message.into())
    }
}
