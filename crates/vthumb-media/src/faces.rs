//! Haar-cascade face detection bank.
//!
//! Classifier files are located by the host and injected here by path;
//! a missing or unloadable cascade is recorded as a warning and its mode
//! simply returns no faces. Detection never fails a run.

use std::fmt;
use std::str::FromStr;

use vthumb_models::PixelBox;

#[cfg(feature = "opencv")]
use std::path::Path;

#[cfg(feature = "opencv")]
use opencv::{
    core::{Rect, Size, Vector},
    objdetect::CascadeClassifier,
    prelude::*,
};

#[cfg(feature = "opencv")]
use tracing::warn;

#[cfg(feature = "opencv")]
use crate::error::{MediaError, MediaResult};

/// Two boxes with at least this much IoU are considered the same face.
const DEDUP_IOU: f64 = 0.5;

/// Detection mode selecting which cascades run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectMode {
    /// Frontal and profile cascades.
    #[default]
    Default,
    /// Eye-with-glasses cascade; eye boxes are expanded to face boxes.
    Glasses,
    /// Smile cascade.
    Smile,
}

impl fmt::Display for DetectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectMode::Default => write!(f, "default"),
            DetectMode::Glasses => write!(f, "glasses"),
            DetectMode::Smile => write!(f, "smile"),
        }
    }
}

impl FromStr for DetectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(DetectMode::Default),
            "glasses" => Ok(DetectMode::Glasses),
            "smile" => Ok(DetectMode::Smile),
            other => Err(format!("unknown detect mode: {other}")),
        }
    }
}

/// Grow a detected eye box into an approximate face box.
///
/// The caller clamps the result to image bounds.
pub fn expand_eye_box(eye: PixelBox) -> PixelBox {
    PixelBox {
        x: eye.x - 0.6 * eye.width,
        y: eye.y - 1.2 * eye.height,
        width: eye.width * 2.2,
        height: eye.height * 3.2,
    }
}

/// Drop boxes that heavily overlap an already-kept larger box.
pub fn dedup_boxes(mut boxes: Vec<PixelBox>) -> Vec<PixelBox> {
    boxes.sort_by(|a, b| b.area().partial_cmp(&a.area()).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<PixelBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) < DEDUP_IOU) {
            kept.push(candidate);
        }
    }
    kept
}

/// Face detection capability consumed by the metrics engine.
///
/// Implementations take the grayscale analysis image and return face
/// boxes in analysis-image coordinates, clamped and deduplicated.
#[cfg(feature = "opencv")]
pub trait FaceDetector {
    fn detect(&mut self, gray: &Mat, mode: DetectMode) -> MediaResult<Vec<PixelBox>>;

    /// Warnings accumulated while constructing the detector.
    fn warnings(&self) -> &[String] {
        &[]
    }
}

/// Haar-cascade bank backing [`FaceDetector`].
#[cfg(feature = "opencv")]
pub struct CascadeFaceDetector {
    frontal: Option<CascadeClassifier>,
    profile: Option<CascadeClassifier>,
    eye_glasses: Option<CascadeClassifier>,
    smile: Option<CascadeClassifier>,
    warnings: Vec<String>,
}

#[cfg(feature = "opencv")]
impl CascadeFaceDetector {
    /// Load cascades from the given files. Any path may be `None`
    /// (cascade not found by the host); any file may fail to load.
    /// Both cases become warnings, never errors.
    pub fn from_paths(
        frontal: Option<&Path>,
        profile: Option<&Path>,
        eye_glasses: Option<&Path>,
        smile: Option<&Path>,
    ) -> Self {
        let mut warnings = Vec::new();
        let frontal = Self::load(frontal, "frontal face", &mut warnings);
        let profile = Self::load(profile, "profile face", &mut warnings);
        let eye_glasses = Self::load(eye_glasses, "eye with glasses", &mut warnings);
        let smile = Self::load(smile, "smile", &mut warnings);
        Self { frontal, profile, eye_glasses, smile, warnings }
    }

    /// A bank with no cascades loaded; every mode detects nothing.
    pub fn empty() -> Self {
        Self { frontal: None, profile: None, eye_glasses: None, smile: None, warnings: Vec::new() }
    }

    fn load(path: Option<&Path>, label: &str, warnings: &mut Vec<String>) -> Option<CascadeClassifier> {
        let path = match path {
            Some(path) => path,
            None => {
                warnings.push(format!("{label} cascade not provided; mode disabled"));
                return None;
            }
        };
        match CascadeClassifier::new(&path.to_string_lossy()) {
            Ok(classifier) if !classifier.empty().unwrap_or(true) => Some(classifier),
            Ok(_) => {
                let message = format!("{label} cascade at {} is empty", path.display());
                warn!("{message}");
                warnings.push(message);
                None
            }
            Err(e) => {
                let message = format!("{label} cascade at {} failed to load: {e}", path.display());
                warn!("{message}");
                warnings.push(message);
                None
            }
        }
    }

    fn run(
        classifier: &mut CascadeClassifier,
        gray: &Mat,
        scale_factor: f64,
        min_neighbors: i32,
        min_size: i32,
    ) -> MediaResult<Vec<PixelBox>> {
        let mut detections = Vector::<Rect>::new();
        classifier
            .detect_multi_scale(
                gray,
                &mut detections,
                scale_factor,
                min_neighbors,
                0,
                Size::new(min_size, min_size),
                Size::new(0, 0),
            )
            .map_err(|e| MediaError::detection(format!("cascade detection: {e}")))?;

        Ok(detections
            .iter()
            .map(|r| PixelBox::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64))
            .collect())
    }
}

#[cfg(feature = "opencv")]
impl FaceDetector for CascadeFaceDetector {
    fn detect(&mut self, gray: &Mat, mode: DetectMode) -> MediaResult<Vec<PixelBox>> {
        let width = gray.cols() as u32;
        let height = gray.rows() as u32;

        let mut boxes = Vec::new();
        match mode {
            DetectMode::Default => {
                if let Some(frontal) = self.frontal.as_mut() {
                    boxes.extend(Self::run(frontal, gray, 1.1, 5, 60)?);
                }
                if let Some(profile) = self.profile.as_mut() {
                    boxes.extend(Self::run(profile, gray, 1.1, 4, 60)?);
                }
            }
            DetectMode::Glasses => {
                if let Some(eyes) = self.eye_glasses.as_mut() {
                    for eye in Self::run(eyes, gray, 1.05, 3, 30)? {
                        boxes.push(expand_eye_box(eye));
                    }
                }
            }
            DetectMode::Smile => {
                if let Some(smile) = self.smile.as_mut() {
                    boxes.extend(Self::run(smile, gray, 1.1, 20, 30)?);
                }
            }
        }

        let clamped: Vec<PixelBox> = boxes
            .into_iter()
            .map(|b| b.clamp_to(width, height))
            .filter(|b| b.area() > 0.0)
            .collect();

        Ok(dedup_boxes(clamped))
    }

    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
