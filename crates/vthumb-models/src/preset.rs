//! Preset definitions: sampling policy, metric weights, and hard thresholds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::OverlayZone;

/// How the preset expresses its sampling density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Value is samples per second.
    Fps,
    /// Value is samples per minute.
    Fpm,
}

/// Sampling policy carried by a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplingPolicy {
    pub mode: SamplingMode,
    /// Sampling value in the unit selected by `mode`. Must be > 0.
    pub value: f64,
}

impl SamplingPolicy {
    /// Resolve to a rate in samples per second.
    pub fn rate_hz(&self) -> f64 {
        match self.mode {
            SamplingMode::Fps => self.value,
            SamplingMode::Fpm => self.value / 60.0,
        }
    }
}

/// Weight vector for the final combined score.
///
/// Weights are applied as-is; no renormalization is performed. The clutter
/// and motion terms are inverted before weighting (low clutter and low
/// motion score high).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetricWeights {
    pub sharpness: f64,
    pub exposure: f64,
    pub contrast: f64,
    pub colorfulness: f64,
    pub face: f64,
    pub centrality: f64,
    pub clutter: f64,
    pub overlay: f64,
    pub motion: f64,
    pub time_prior: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            sharpness: 0.20,
            exposure: 0.10,
            contrast: 0.10,
            colorfulness: 0.10,
            face: 0.15,
            centrality: 0.10,
            clutter: 0.05,
            overlay: 0.10,
            motion: 0.05,
            time_prior: 0.05,
        }
    }
}

impl MetricWeights {
    /// Sum of all weights (upper bound of the combined score).
    pub fn total(&self) -> f64 {
        self.sharpness
            + self.exposure
            + self.contrast
            + self.colorfulness
            + self.face
            + self.centrality
            + self.clutter
            + self.overlay
            + self.motion
            + self.time_prior
    }
}

/// Gate thresholds applied to raw metric values before ranking.
///
/// `sharp_min`, `l_min`, and `l_max` are in the raw metric domain
/// (Laplacian variance and Lab L values), never the normalized one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HardThresholds {
    /// Minimum raw sharpness (Laplacian variance).
    pub sharp_min: f64,
    /// Minimum raw exposure (mean Lab L, 0-255).
    pub l_min: f64,
    /// Maximum raw exposure (mean Lab L, 0-255).
    pub l_max: f64,
    /// Minimum time separation between any two selected frames.
    pub temporal_min_gap_sec: f64,
    /// Minimum appearance distance between any two selected frames.
    pub appearance_min_dist: f64,
}

impl Default for HardThresholds {
    fn default() -> Self {
        Self {
            sharp_min: 50.0,
            l_min: 15.0,
            l_max: 240.0,
            temporal_min_gap_sec: 2.0,
            appearance_min_dist: 0.25,
        }
    }
}

/// A scoring preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PresetDefinition {
    /// Preset name, echoed into the manifest.
    pub name: String,
    /// Reject frames without any detected face.
    pub require_face: bool,
    /// Sampling policy; when absent the session falls back to
    /// `min(video_fps, 2.0)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingPolicy>,
    pub weights: MetricWeights,
    pub thresholds: HardThresholds,
    /// Regions where a future text overlay is expected.
    pub overlay_zones: Vec<OverlayZone>,
}

impl Default for PresetDefinition {
    fn default() -> Self {
        Self {
            name: "balanced".to_string(),
            require_face: false,
            sampling: None,
            weights: MetricWeights::default(),
            thresholds: HardThresholds::default(),
            overlay_zones: Vec::new(),
        }
    }
}

impl PresetDefinition {
    /// A preset biased toward frames with people in them.
    pub fn face_focused() -> Self {
        Self {
            name: "face-focused".to_string(),
            require_face: true,
            weights: MetricWeights {
                face: 0.25,
                centrality: 0.15,
                sharpness: 0.15,
                time_prior: 0.0,
                ..MetricWeights::default()
            },
            ..Self::default()
        }
    }

    /// Check the preset for structurally invalid values.
    ///
    /// Returns a list of problems; empty means the preset is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(sampling) = &self.sampling {
            if sampling.value <= 0.0 {
                problems.push(format!("sampling value must be > 0, got {}", sampling.value));
            }
        }
        if self.thresholds.l_min > self.thresholds.l_max {
            problems.push(format!(
                "exposure window is empty: l_min {} > l_max {}",
                self.thresholds.l_min, self.thresholds.l_max
            ));
        }
        for (i, zone) in self.overlay_zones.iter().enumerate() {
            if !zone.is_valid() {
                problems.push(format!("overlay zone {} does not fit the frame", i));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = MetricWeights::default();
        assert!((weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = HardThresholds::default();
        assert_eq!(thresholds.sharp_min, 50.0);
        assert_eq!(thresholds.l_min, 15.0);
        assert_eq!(thresholds.l_max, 240.0);
    }

    #[test]
    fn test_sampling_policy_rate() {
        let fps = SamplingPolicy { mode: SamplingMode::Fps, value: 3.0 };
        assert!((fps.rate_hz() - 3.0).abs() < 1e-9);

        let fpm = SamplingPolicy { mode: SamplingMode::Fpm, value: 30.0 };
        assert!((fpm.rate_hz() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_validate_flags_bad_zone() {
        let preset = PresetDefinition {
            overlay_zones: vec![OverlayZone::new(0.8, 0.8, 0.5, 0.5)],
            ..Default::default()
        };
        assert_eq!(preset.validate().len(), 1);
        assert!(PresetDefinition::default().validate().is_empty());
    }

    #[test]
    fn test_preset_roundtrip() {
        let preset = PresetDefinition::face_focused();
        let json = serde_json::to_string(&preset).unwrap();
        let back: PresetDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(preset, back);
    }
}
