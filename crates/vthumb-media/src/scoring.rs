//! Pure scoring logic: metric bookkeeping, corpus normalization, weighted
//! combination, and hard-gate rejection.
//!
//! Raw metric extraction lives in [`crate::metrics`]; everything here
//! operates on plain numbers so it can be tested without a decoder.

use vthumb_models::{PixelBox, HardThresholds, MetricWeights};

/// Number of per-frame metrics.
pub const METRIC_COUNT: usize = 10;

/// Floor applied to a metric's corpus range during normalization.
const RANGE_FLOOR: f64 = 1e-6;

/// The ten per-frame metrics, in manifest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Variance of the Laplacian of the grayscale analysis image.
    Sharpness,
    /// Mean of the Lab L channel (roughly 0-255).
    Exposure,
    /// Standard deviation of the Lab L channel.
    Contrast,
    /// Hasler-Süsstrunk colorfulness.
    Colorfulness,
    /// Largest-face area over image area, in [0, 1].
    Face,
    /// Proximity of the largest face to a rule-of-thirds point.
    Centrality,
    /// Edge density outside face regions. Scored inverted.
    Clutter,
    /// Overlay-zone safety, in [0, 1].
    Overlay,
    /// Frame difference against the previous sample. Scored inverted.
    Motion,
    /// Prior peaking at the video midpoint.
    TimePrior,
}

impl MetricKind {
    /// All metrics in manifest order.
    pub const ALL: [MetricKind; METRIC_COUNT] = [
        MetricKind::Sharpness,
        MetricKind::Exposure,
        MetricKind::Contrast,
        MetricKind::Colorfulness,
        MetricKind::Face,
        MetricKind::Centrality,
        MetricKind::Clutter,
        MetricKind::Overlay,
        MetricKind::Motion,
        MetricKind::TimePrior,
    ];

    #[inline]
    fn index(self) -> usize {
        match self {
            MetricKind::Sharpness => 0,
            MetricKind::Exposure => 1,
            MetricKind::Contrast => 2,
            MetricKind::Colorfulness => 3,
            MetricKind::Face => 4,
            MetricKind::Centrality => 5,
            MetricKind::Clutter => 6,
            MetricKind::Overlay => 7,
            MetricKind::Motion => 8,
            MetricKind::TimePrior => 9,
        }
    }
}

/// One value per metric, raw or normalized depending on context.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSet([f64; METRIC_COUNT]);

impl MetricSet {
    #[inline]
    pub fn get(&self, kind: MetricKind) -> f64 {
        self.0[kind.index()]
    }

    #[inline]
    pub fn set(&mut self, kind: MetricKind, value: f64) {
        self.0[kind.index()] = value;
    }
}

/// Min-max normalize each metric independently across the corpus.
///
/// The per-metric range has a floor of 1e-6, so a metric that is constant
/// across the corpus normalizes to 0 for every frame. Input raw values are
/// untouched.
pub fn normalize_corpus(raw: &[MetricSet]) -> Vec<MetricSet> {
    let mut normalized = vec![MetricSet::default(); raw.len()];
    if raw.is_empty() {
        return normalized;
    }

    for kind in MetricKind::ALL {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for set in raw {
            let v = set.get(kind);
            min = min.min(v);
            max = max.max(v);
        }
        let range = (max - min).max(RANGE_FLOOR);
        for (out, set) in normalized.iter_mut().zip(raw) {
            out.set(kind, (set.get(kind) - min) / range);
        }
    }

    normalized
}

/// Combine normalized metrics into the final weighted score.
///
/// Clutter and motion enter inverted: calm, static frames score high.
/// Weights are applied as-is with no renormalization.
pub fn combined_score(norm: &MetricSet, weights: &MetricWeights) -> f64 {
    weights.sharpness * norm.get(MetricKind::Sharpness)
        + weights.exposure * norm.get(MetricKind::Exposure)
        + weights.contrast * norm.get(MetricKind::Contrast)
        + weights.colorfulness * norm.get(MetricKind::Colorfulness)
        + weights.face * norm.get(MetricKind::Face)
        + weights.centrality * norm.get(MetricKind::Centrality)
        + weights.clutter * (1.0 - norm.get(MetricKind::Clutter))
        + weights.overlay * norm.get(MetricKind::Overlay)
        + weights.motion * (1.0 - norm.get(MetricKind::Motion))
        + weights.time_prior * norm.get(MetricKind::TimePrior)
}

/// Decide whether a frame is rejected before ranking.
///
/// All gates test raw values: Laplacian variance for sharpness and mean
/// Lab L for exposure. Normalized values must never be gated.
pub fn is_hard_rejected(raw: &MetricSet, thresholds: &HardThresholds, require_face: bool) -> bool {
    if raw.get(MetricKind::Sharpness) < thresholds.sharp_min {
        return true;
    }
    let exposure = raw.get(MetricKind::Exposure);
    if exposure < thresholds.l_min || exposure > thresholds.l_max {
        return true;
    }
    if require_face && raw.get(MetricKind::Face) <= 0.0 {
        return true;
    }
    false
}

/// Temporal prior peaking at the video midpoint.
///
/// Returns 0.5 when the duration is unknown.
pub fn time_prior(t: f64, duration_sec: f64) -> f64 {
    if duration_sec <= 0.0 {
        return 0.5;
    }
    let n = (t / duration_sec).clamp(0.0, 1.0);
    (1.0 - 2.0 * (n - 0.5).abs()).max(0.0)
}

/// Largest-face area over image area, clamped to [0, 1]. No faces scores 0.
pub fn face_score(faces: &[PixelBox], width: f64, height: f64) -> f64 {
    let image_area = width * height;
    if image_area <= 0.0 {
        return 0.0;
    }
    match PixelBox::largest(faces) {
        Some(face) => (face.area() / image_area).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Proximity of the largest face center to the nearest rule-of-thirds
/// intersection, normalized by the center-to-corner length. No faces
/// scores a neutral 0.5.
pub fn centrality(faces: &[PixelBox], width: f64, height: f64) -> f64 {
    let face = match PixelBox::largest(faces) {
        Some(face) => face,
        None => return 0.5,
    };
    if width <= 0.0 || height <= 0.0 {
        return 0.5;
    }

    let thirds = [
        (width / 3.0, height / 3.0),
        (2.0 * width / 3.0, height / 3.0),
        (width / 3.0, 2.0 * height / 3.0),
        (2.0 * width / 3.0, 2.0 * height / 3.0),
    ];

    let (cx, cy) = (face.cx(), face.cy());
    let mut min_dist = f64::INFINITY;
    for (tx, ty) in thirds {
        let dist = ((cx - tx).powi(2) + (cy - ty).powi(2)).sqrt();
        min_dist = min_dist.min(dist);
    }

    let half_diagonal = ((width / 2.0).powi(2) + (height / 2.0).powi(2)).sqrt();
    let ratio = (min_dist / half_diagonal).clamp(0.0, 1.0);
    1.0 - ratio
}
