//! Per-frame metric extraction.
//!
//! The engine turns each decoded frame into a [`FrameMetrics`] carrying
//! ten raw metric values plus detected faces:
//!
//! 1. Downscale to the analysis width (aspect preserved)
//! 2. Detect faces on the grayscale analysis image
//! 3. Sharpness (Laplacian variance), exposure/contrast (Lab L),
//!    colorfulness (Hasler-Süsstrunk), clutter (Canny minus faces),
//!    overlay safety (Sobel busyness per zone), motion (difference
//!    against the stored previous luma), time prior
//!
//! The engine owns exactly one previous-luma image for motion; it is
//! replaced after every call, so evaluation order matters and neighbor
//! passes perturb it. Corpus normalization and the weighted score are
//! applied in a second pass once every frame has been evaluated.

use std::sync::Mutex;

use opencv::{
    core::{self, Mat, Rect, Scalar, Size, ToInputArray, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

use vthumb_models::{PixelBox, HardThresholds, MetricWeights, OverlayZone};

use crate::error::{MediaError, MediaResult};
use crate::faces::{DetectMode, FaceDetector};
use crate::frame::FrameMetrics;
use crate::scoring::{self, MetricKind, MetricSet};

/// Engine configuration. These are design constants of the scoring
/// model, not preset knobs.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Target width of the analysis image.
    pub analysis_width: i32,
    /// Exponent applied to the overlay safety term.
    pub overlay_penalty_power: f64,
    /// Canny thresholds for the clutter metric.
    pub canny_low: f64,
    pub canny_high: f64,
    /// Cascade mode used for face detection.
    pub detect_mode: DetectMode,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            analysis_width: 640,
            overlay_penalty_power: 1.0,
            canny_low: 100.0,
            canny_high: 200.0,
            detect_mode: DetectMode::Default,
        }
    }
}

/// Padding in pixels around each face before masking it out of the
/// clutter edge map.
const FACE_MASK_PAD: f64 = 5.0;

/// Divisor turning an overlay zone's Sobel deviation into a busy score.
const OVERLAY_BUSY_DIV: f64 = 100.0;

/// IoU above which a face counts as colliding with an overlay zone.
const OVERLAY_FACE_IOU: f64 = 0.1;

/// Stateful metrics engine, one per session.
pub struct MetricsEngine {
    config: MetricsConfig,
    // Locked so a future host can share one engine across evaluations.
    detector: Mutex<Box<dyn FaceDetector + Send>>,
    prev_gray: Option<Mat>,
}

impl MetricsEngine {
    /// Create an engine around an injected face detector.
    pub fn new(detector: Box<dyn FaceDetector + Send>, config: MetricsConfig) -> Self {
        Self { config, detector: Mutex::new(detector), prev_gray: None }
    }

    /// Warnings accumulated by the detector bank.
    pub fn warnings(&self) -> Vec<String> {
        match self.detector.lock() {
            Ok(detector) => detector.warnings().to_vec(),
            Err(_) => vec!["face detector lock poisoned".to_string()],
        }
    }

    /// Forget the stored previous luma, e.g. before a neighbor pass that
    /// should not difference against the main pass's last frame.
    pub fn reset_motion(&mut self) {
        self.prev_gray = None;
    }

    /// Evaluate a single decoded frame into raw metrics.
    ///
    /// Normalized values and the score stay zero until
    /// [`MetricsEngine::normalize_and_score`] runs over the corpus.
    pub fn evaluate(
        &mut self,
        t: f64,
        full: Mat,
        duration_sec: f64,
        zones: &[OverlayZone],
    ) -> MediaResult<FrameMetrics> {
        let analysis = self.downscale(&full)?;
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&analysis, &mut gray, imgproc::COLOR_BGR2GRAY)
            .map_err(|e| MediaError::metric(format!("grayscale conversion: {e}")))?;

        let faces = self
            .detector
            .lock()
            .map_err(|_| MediaError::detection("face detector lock poisoned"))?
            .detect(&gray, self.config.detect_mode)?;

        let width = analysis.cols() as f64;
        let height = analysis.rows() as f64;

        let mut raw = MetricSet::default();
        raw.set(MetricKind::Sharpness, sharpness(&gray)?);
        let (exposure, contrast) = exposure_contrast(&analysis)?;
        raw.set(MetricKind::Exposure, exposure);
        raw.set(MetricKind::Contrast, contrast);
        raw.set(MetricKind::Colorfulness, colorfulness(&analysis)?);
        raw.set(MetricKind::Face, scoring::face_score(&faces, width, height));
        raw.set(MetricKind::Centrality, scoring::centrality(&faces, width, height));
        raw.set(MetricKind::Clutter, self.clutter(&gray, &faces)?);
        raw.set(MetricKind::Overlay, self.overlay_safety(&gray, zones, &faces)?);
        raw.set(MetricKind::Motion, self.motion(&gray)?);
        raw.set(MetricKind::TimePrior, scoring::time_prior(t, duration_sec));

        debug!(
            t = format!("{t:.3}"),
            sharpness = format!("{:.1}", raw.get(MetricKind::Sharpness)),
            exposure = format!("{:.1}", raw.get(MetricKind::Exposure)),
            faces = faces.len(),
            "Frame evaluated"
        );

        self.prev_gray = Some(gray);

        Ok(FrameMetrics {
            t,
            full,
            analysis,
            faces,
            raw,
            norm: MetricSet::default(),
            score: 0.0,
            saved_path: None,
        })
    }

    /// Normalize the corpus in place and write the final scores.
    pub fn normalize_and_score(&self, frames: &mut [FrameMetrics], weights: &MetricWeights) {
        let raws: Vec<MetricSet> = frames.iter().map(|f| f.raw).collect();
        let norms = scoring::normalize_corpus(&raws);
        for (frame, norm) in frames.iter_mut().zip(norms) {
            frame.norm = norm;
            frame.score = scoring::combined_score(&norm, weights);
        }
    }

    /// Hard-gate decision for one frame. Tests the raw values.
    pub fn hard_rejected(
        &self,
        frame: &FrameMetrics,
        thresholds: &HardThresholds,
        require_face: bool,
    ) -> bool {
        scoring::is_hard_rejected(&frame.raw, thresholds, require_face)
    }

    fn downscale(&self, full: &Mat) -> MediaResult<Mat> {
        let width = full.cols();
        if width <= self.config.analysis_width {
            return full
                .try_clone()
                .map_err(|e| MediaError::metric(format!("analysis copy: {e}")));
        }
        let scale = self.config.analysis_width as f64 / width as f64;
        let height = ((full.rows() as f64 * scale).round()).max(1.0) as i32;
        let mut out = Mat::default();
        imgproc::resize(
            full,
            &mut out,
            Size::new(self.config.analysis_width, height),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )
        .map_err(|e| MediaError::metric(format!("analysis resize: {e}")))?;
        Ok(out)
    }

    /// Edge density outside face regions.
    fn clutter(&self, gray: &Mat, faces: &[PixelBox]) -> MediaResult<f64> {
        let mut edges = Mat::default();
        imgproc::canny(gray, &mut edges, self.config.canny_low, self.config.canny_high, 3, false)
            .map_err(|e| MediaError::metric(format!("canny: {e}")))?;

        for face in faces {
            let masked = face.grow(FACE_MASK_PAD).clamp_to(gray.cols() as u32, gray.rows() as u32);
            let rect = to_rect(&masked);
            if rect.width <= 0 || rect.height <= 0 {
                continue;
            }
            imgproc::rectangle(&mut edges, rect, Scalar::all(0.0), imgproc::FILLED, imgproc::LINE_8, 0)
                .map_err(|e| MediaError::metric(format!("face mask: {e}")))?;
        }

        let nonzero = core::count_non_zero(&edges)
            .map_err(|e| MediaError::metric(format!("edge count: {e}")))? as f64;
        let area = (gray.cols() as f64) * (gray.rows() as f64);
        if area <= 0.0 {
            return Ok(0.0);
        }
        Ok(nonzero / area)
    }

    /// Penalize busy or face-covered overlay zones. Returns 1.0 when no
    /// zones are configured.
    fn overlay_safety(
        &self,
        gray: &Mat,
        zones: &[OverlayZone],
        faces: &[PixelBox],
    ) -> MediaResult<f64> {
        if zones.is_empty() {
            return Ok(1.0);
        }

        let width = gray.cols() as u32;
        let height = gray.rows() as u32;
        let mut total_penalty = 0.0;

        for zone in zones {
            let pixels = zone.to_pixels(width, height);
            let rect = to_rect(&pixels);
            if rect.width <= 0 || rect.height <= 0 {
                continue;
            }

            let roi = Mat::roi(gray, rect)
                .map_err(|e| MediaError::metric(format!("overlay roi: {e}")))?;
            let mut response = Mat::default();
            imgproc::sobel(&roi, &mut response, core::CV_64F, 2, 2, 3, 1.0, 0.0, core::BORDER_DEFAULT)
                .map_err(|e| MediaError::metric(format!("overlay sobel: {e}")))?;
            let (_, edges_std) = mean_std(&response)?;

            let busy = (edges_std / OVERLAY_BUSY_DIV).min(1.0);
            let face_overlap =
                if faces.iter().any(|f| f.iou(&pixels) > OVERLAY_FACE_IOU) { 1.0 } else { 0.0 };
            total_penalty += (busy + face_overlap) / 2.0;
        }

        let norm = (total_penalty / zones.len() as f64).clamp(0.0, 1.0);
        Ok((1.0 - norm).powf(self.config.overlay_penalty_power))
    }

    /// Deviation of the difference against the previous sample's luma.
    /// The first frame of a session scores 0.
    fn motion(&self, gray: &Mat) -> MediaResult<f64> {
        let prev = match &self.prev_gray {
            Some(prev) => prev,
            None => return Ok(0.0),
        };
        let same_size = prev
            .size()
            .and_then(|p| gray.size().map(|g| p == g))
            .map_err(|e| MediaError::metric(format!("motion size: {e}")))?;
        if !same_size {
            return Ok(0.0);
        }

        let mut diff = Mat::default();
        core::absdiff(prev, gray, &mut diff)
            .map_err(|e| MediaError::metric(format!("motion absdiff: {e}")))?;
        let (_, std) = mean_std(&diff)?;
        Ok(std)
    }
}

/// Variance of the Laplacian response.
fn sharpness(gray: &Mat) -> MediaResult<f64> {
    let mut laplacian = Mat::default();
    imgproc::laplacian(gray, &mut laplacian, core::CV_64F, 1, 1.0, 0.0, core::BORDER_DEFAULT)
        .map_err(|e| MediaError::metric(format!("laplacian: {e}")))?;
    let (_, std) = mean_std(&laplacian)?;
    Ok(std * std)
}

/// Mean and deviation of the Lab L channel.
fn exposure_contrast(analysis: &Mat) -> MediaResult<(f64, f64)> {
    let mut lab = Mat::default();
    imgproc::cvt_color_def(analysis, &mut lab, imgproc::COLOR_BGR2Lab)
        .map_err(|e| MediaError::metric(format!("lab conversion: {e}")))?;
    let mut channels = Vector::<Mat>::new();
    core::split(&lab, &mut channels).map_err(|e| MediaError::metric(format!("lab split: {e}")))?;
    let l = channels.get(0).map_err(|e| MediaError::metric(format!("lab channel: {e}")))?;
    mean_std(&l)
}

/// Hasler-Süsstrunk colorfulness: sigma(|R-G|) + 0.3 * sigma(|(R+G)/2 - B|).
fn colorfulness(analysis: &Mat) -> MediaResult<f64> {
    let mut channels = Vector::<Mat>::new();
    core::split(analysis, &mut channels)
        .map_err(|e| MediaError::metric(format!("bgr split: {e}")))?;
    if channels.len() < 3 {
        return Ok(0.0);
    }
    let b = channels.get(0).map_err(|e| MediaError::metric(format!("channel: {e}")))?;
    let g = channels.get(1).map_err(|e| MediaError::metric(format!("channel: {e}")))?;
    let r = channels.get(2).map_err(|e| MediaError::metric(format!("channel: {e}")))?;

    let mut rg = Mat::default();
    core::absdiff(&r, &g, &mut rg).map_err(|e| MediaError::metric(format!("rg absdiff: {e}")))?;

    let mut rg_mean = Mat::default();
    core::add_weighted(&r, 0.5, &g, 0.5, 0.0, &mut rg_mean, -1)
        .map_err(|e| MediaError::metric(format!("rg mean: {e}")))?;
    let mut yb = Mat::default();
    core::absdiff(&rg_mean, &b, &mut yb)
        .map_err(|e| MediaError::metric(format!("yb absdiff: {e}")))?;

    let (_, rg_std) = mean_std(&rg)?;
    let (_, yb_std) = mean_std(&yb)?;
    Ok(rg_std + 0.3 * yb_std)
}

fn mean_std(m: &impl ToInputArray) -> MediaResult<(f64, f64)> {
    let mut mean = Scalar::default();
    let mut std = Scalar::default();
    core::mean_std_dev(m, &mut mean, &mut std, &core::no_array())
        .map_err(|e| MediaError::metric(format!("meanStdDev: {e}")))?;
    Ok((mean[0], std[0]))
}

fn to_rect(b: &PixelBox) -> Rect {
    Rect::new(
        b.x.floor() as i32,
        b.y.floor() as i32,
        b.width.floor() as i32,
        b.height.floor() as i32,
    )
}
