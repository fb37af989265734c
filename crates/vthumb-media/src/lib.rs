//! Image analysis for thumbnail-candidate scoring.
//!
//! This crate provides:
//! - The `VideoSource` capability and its OpenCV `VideoCapture` backing
//! - A Haar-cascade face detector bank with pluggable modes
//! - The metrics engine: ten per-frame quality metrics, corpus
//!   normalization, weighted combination, and hard-gate rejection
//! - The appearance distance used by diverse top-K selection
//!
//! Everything that touches pixel buffers sits behind the `opencv`
//! feature (on by default). The numeric scoring logic is pure and
//! available without it.

pub mod error;
pub mod faces;
pub mod scoring;

#[cfg(feature = "opencv")]
pub mod appearance;
#[cfg(feature = "opencv")]
pub mod frame;
#[cfg(feature = "opencv")]
pub mod metrics;
#[cfg(feature = "opencv")]
pub mod source;

pub use error::{MediaError, MediaResult};
pub use faces::DetectMode;
pub use scoring::{MetricKind, MetricSet, METRIC_COUNT};

#[cfg(feature = "opencv")]
pub use appearance::appearance_distance;
#[cfg(feature = "opencv")]
pub use faces::{CascadeFaceDetector, FaceDetector};
#[cfg(feature = "opencv")]
pub use frame::FrameMetrics;
#[cfg(feature = "opencv")]
pub use metrics::{MetricsConfig, MetricsEngine};
#[cfg(feature = "opencv")]
pub use source::{OpenCvVideoSource, VideoSource};
