//! Progress reporting.
//!
//! The session emits coarse stage events plus per-frame counts during
//! sampling. Hosts supply a callback; the transport (UI, logging,
//! metrics) is theirs to choose.

use std::fmt;
use std::sync::Arc;

use tracing::info;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    OpeningVideo,
    SamplingFrames,
    ScoringFrames,
    SelectingCandidates,
    FetchingNeighbors,
    WritingManifest,
    Completed,
    ConfigurationWarning,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::OpeningVideo => "Opening video",
            Stage::SamplingFrames => "Sampling frames",
            Stage::ScoringFrames => "Scoring frames",
            Stage::SelectingCandidates => "Selecting top candidates",
            Stage::FetchingNeighbors => "Fetching neighbors",
            Stage::WritingManifest => "Writing manifest",
            Stage::Completed => "Completed",
            Stage::ConfigurationWarning => "Configuration warning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress event. A non-positive `maximum` signals indeterminate
/// progress for the stage.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub value: i64,
    pub maximum: i64,
    pub detail: Option<String>,
}

impl ProgressEvent {
    /// Event with no measurable extent.
    pub fn indeterminate(stage: Stage) -> Self {
        Self { stage, value: 0, maximum: 0, detail: None }
    }

    /// Event carrying a position within a known total.
    pub fn counted(stage: Stage, value: i64, maximum: i64) -> Self {
        Self { stage, value, maximum, detail: None }
    }

    /// Attach a human-readable detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_indeterminate(&self) -> bool {
        self.maximum <= 0
    }
}

/// Progress callback type.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A callback that drops every event.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// A callback that forwards events to `tracing`.
pub fn log_progress() -> ProgressCallback {
    Arc::new(|event| {
        info!(
            stage = %event.stage,
            value = event.value,
            maximum = event.maximum,
            detail = event.detail.as_deref().unwrap_or(""),
            "Pipeline progress"
        );
    })
}
