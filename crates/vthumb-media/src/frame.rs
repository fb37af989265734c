//! Per-frame state carried through the pipeline.

use opencv::core::Mat;

use vthumb_models::PixelBox;

use crate::scoring::MetricSet;

/// Everything known about one sampled frame.
///
/// Raw values are written once by the metrics engine during evaluation;
/// normalized values and the score become meaningful only after the
/// corpus-wide normalize step. Image buffers are released at the latest
/// when the session ends.
#[derive(Debug)]
pub struct FrameMetrics {
    /// Sample time in seconds.
    pub t: f64,
    /// Full-resolution decoded image (BGR).
    pub full: Mat,
    /// Downscaled analysis image (BGR, fixed target width).
    pub analysis: Mat,
    /// Detected faces in analysis-image coordinates.
    pub faces: Vec<PixelBox>,
    /// Raw metric values, unbounded.
    pub raw: MetricSet,
    /// Normalized metric values in [0, 1]; valid after normalization.
    pub norm: MetricSet,
    /// Final combined score; valid after normalization.
    pub score: f64,
    /// Path the frame image was saved under, set once by the writer.
    pub saved_path: Option<String>,
}

impl FrameMetrics {
    /// Drop the image buffers, keeping scores and bookkeeping.
    pub fn release_images(&mut self) {
        self.full = Mat::default();
        self.analysis = Mat::default();
    }
}
