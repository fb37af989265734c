//! Output manifest document.
//!
//! Field names are part of the external contract and must not change;
//! hosts parse this file to present picks and neighbor strips.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a manifest back from disk.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Video facts echoed into the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestVideo {
    pub path: String,
    #[serde(rename = "durationSec")]
    pub duration_sec: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Resolved run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestParameters {
    /// Resolved sample rate in Hz.
    pub fps: f64,
    /// Requested number of top picks.
    pub top: usize,
    /// Requested neighbor radius.
    pub neighbors: usize,
}

/// Per-frame score record: normalized and raw value for each metric,
/// the combined score, and the saved frame image path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameScore {
    pub t: f64,
    pub sharp: f64,
    #[serde(rename = "sharpRaw")]
    pub sharp_raw: f64,
    pub exposure: f64,
    #[serde(rename = "exposureRaw")]
    pub exposure_raw: f64,
    pub contrast: f64,
    #[serde(rename = "contrastRaw")]
    pub contrast_raw: f64,
    pub color: f64,
    #[serde(rename = "colorRaw")]
    pub color_raw: f64,
    pub face: f64,
    #[serde(rename = "faceRaw")]
    pub face_raw: f64,
    pub centrality: f64,
    #[serde(rename = "centralityRaw")]
    pub centrality_raw: f64,
    pub clutter: f64,
    #[serde(rename = "clutterRaw")]
    pub clutter_raw: f64,
    pub overlay: f64,
    #[serde(rename = "overlayRaw")]
    pub overlay_raw: f64,
    pub motion: f64,
    #[serde(rename = "motionRaw")]
    pub motion_raw: f64,
    pub time: f64,
    #[serde(rename = "timeRaw")]
    pub time_raw: f64,
    pub score: f64,
    pub path: String,
}

/// A neighbor of a top pick, `dt` sample intervals away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NeighborPick {
    /// Signed offset in sample intervals.
    pub dt: i32,
    /// Saved candidate image path.
    pub path: String,
}

/// Suggested 16:9 crop in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropRect {
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
    #[serde(rename = "Width")]
    pub width: i32,
    #[serde(rename = "Height")]
    pub height: i32,
}

/// One selected candidate with its neighbor strip and suggested crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopPick {
    pub t: f64,
    pub score: f64,
    pub path: String,
    pub neighbors: Vec<NeighborPick>,
    #[serde(rename = "suggestedCrop")]
    pub suggested_crop: CropRect,
}

/// The manifest document written at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub video: ManifestVideo,
    pub preset: String,
    pub parameters: ManifestParameters,
    #[serde(rename = "framesAnalyzed")]
    pub frames_analyzed: usize,
    pub scores: Vec<FrameScore>,
    pub top: Vec<TopPick>,
}

impl Manifest {
    /// Serialize to the on-disk JSON form.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a manifest back from a reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ManifestError> {
        let mut body = String::new();
        reader.read_to_string(&mut body)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Read a manifest back from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        Manifest {
            video: ManifestVideo {
                path: "clip.mp4".to_string(),
                duration_sec: 10.0,
                fps: 30.0,
                width: 1920,
                height: 1080,
            },
            preset: "balanced".to_string(),
            parameters: ManifestParameters { fps: 2.0, top: 3, neighbors: 1 },
            frames_analyzed: 1,
            scores: vec![FrameScore {
                t: 1.5,
                sharp: 1.0,
                sharp_raw: 120.0,
                exposure: 0.5,
                exposure_raw: 128.0,
                contrast: 0.5,
                contrast_raw: 40.0,
                color: 0.25,
                color_raw: 18.0,
                face: 0.0,
                face_raw: 0.0,
                centrality: 0.5,
                centrality_raw: 0.5,
                clutter: 0.1,
                clutter_raw: 0.02,
                overlay: 1.0,
                overlay_raw: 1.0,
                motion: 0.0,
                motion_raw: 0.0,
                time: 0.3,
                time_raw: 0.3,
                score: 0.61,
                path: "frames/f_000001.500.png".to_string(),
            }],
            top: vec![TopPick {
                t: 1.5,
                score: 0.61,
                path: "candidates/c_000001.500_main.png".to_string(),
                neighbors: vec![
                    NeighborPick { dt: -1, path: "candidates/c_000001.500_m1.png".to_string() },
                    NeighborPick { dt: 1, path: "candidates/c_000001.500_p1.png".to_string() },
                ],
                suggested_crop: CropRect { x: 0, y: 0, width: 1920, height: 1080 },
            }],
        }
    }

    #[test]
    fn test_field_names_are_exact() {
        let json = sample_manifest().to_json().unwrap();
        for key in [
            "\"durationSec\"",
            "\"framesAnalyzed\"",
            "\"sharpRaw\"",
            "\"exposureRaw\"",
            "\"contrastRaw\"",
            "\"colorRaw\"",
            "\"faceRaw\"",
            "\"centralityRaw\"",
            "\"clutterRaw\"",
            "\"overlayRaw\"",
            "\"motionRaw\"",
            "\"timeRaw\"",
            "\"suggestedCrop\"",
            "\"X\"",
            "\"Y\"",
            "\"Width\"",
            "\"Height\"",
            "\"dt\"",
        ] {
            assert!(json.contains(key), "missing key {key} in manifest JSON");
        }
        // No accidental snake_case leaks of renamed fields
        assert!(!json.contains("sharp_raw"));
        assert!(!json.contains("duration_sec"));
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let manifest = sample_manifest();
        let json = manifest.to_json().unwrap();
        let back = Manifest::from_reader(json.as_bytes()).unwrap();
        assert_eq!(manifest, back);
        // Re-serialization of the parsed document is byte-identical
        assert_eq!(json, back.to_json().unwrap());
    }
}
