//! Per-run session options.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Options for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionOptions {
    /// Input video path.
    pub input: PathBuf,
    /// Output directory (created if absent; expected writable).
    pub output_dir: PathBuf,
    /// Number of top candidates to select. Must be > 0.
    pub top_k: usize,
    /// Neighbor radius: offsets ±1..=±neighbor_count are fetched per pick.
    pub neighbor_count: usize,
    /// Explicit neighbor offsets, overriding `neighbor_count` generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_offsets: Option<Vec<i32>>,
    /// Explicit sample rate in Hz, overriding the preset's sampling policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

impl SessionOptions {
    /// Create options with the documented defaults: five picks, two
    /// neighbors per side, sampling from the preset.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            top_k: 5,
            neighbor_count: 2,
            neighbor_offsets: None,
            sample_rate: None,
        }
    }
}
