//! Appearance distance between two frames.
//!
//! Combines a per-channel YCrCb histogram divergence on 64x64 thumbnails
//! with the IoU of the largest faces. Used by the ranker to keep the
//! selected set visually diverse.

use opencv::{
    core::{self, Mat, Size, Vector},
    imgproc,
    prelude::*,
};

use vthumb_models::PixelBox;

use crate::error::{MediaError, MediaResult};
use crate::frame::FrameMetrics;

/// Thumbnail side used for histogram comparison.
const THUMB_SIZE: i32 = 64;

/// Histogram bins per channel.
const HIST_BINS: i32 = 32;

/// Appearance distance between two evaluated frames.
///
/// `(color_distance + (1 - face_overlap)) / 2`, where the color term is
/// the mean per-channel `1 - correlation` of YCrCb histograms and the
/// face term is the IoU of the largest face in each frame (0 when either
/// frame has none).
pub fn appearance_distance(a: &FrameMetrics, b: &FrameMetrics) -> MediaResult<f64> {
    let color = color_distance(&a.analysis, &b.analysis)?;
    let overlap = face_overlap(&a.faces, &b.faces);
    Ok((color + (1.0 - overlap)) / 2.0)
}

/// IoU of the largest faces, or 0 when either set is empty.
pub fn face_overlap(a: &[PixelBox], b: &[PixelBox]) -> f64 {
    match (PixelBox::largest(a), PixelBox::largest(b)) {
        (Some(fa), Some(fb)) => fa.iou(fb),
        _ => 0.0,
    }
}

fn color_distance(a: &Mat, b: &Mat) -> MediaResult<f64> {
    let ta = thumb_ycrcb(a)?;
    let tb = thumb_ycrcb(b)?;

    let mut channels_a = Vector::<Mat>::new();
    let mut channels_b = Vector::<Mat>::new();
    core::split(&ta, &mut channels_a).map_err(|e| MediaError::metric(format!("split: {e}")))?;
    core::split(&tb, &mut channels_b).map_err(|e| MediaError::metric(format!("split: {e}")))?;

    let count = channels_a.len().min(channels_b.len());
    if count == 0 {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for i in 0..count {
        let ha = channel_histogram(&channels_a.get(i).map_err(map_cv)?)?;
        let hb = channel_histogram(&channels_b.get(i).map_err(map_cv)?)?;
        let correlation = imgproc::compare_hist(&ha, &hb, imgproc::HISTCMP_CORREL)
            .map_err(|e| MediaError::metric(format!("compareHist: {e}")))?;
        total += 1.0 - correlation;
    }

    Ok(total / count as f64)
}

fn thumb_ycrcb(image: &Mat) -> MediaResult<Mat> {
    let mut thumb = Mat::default();
    imgproc::resize(
        image,
        &mut thumb,
        Size::new(THUMB_SIZE, THUMB_SIZE),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )
    .map_err(|e| MediaError::metric(format!("thumbnail resize: {e}")))?;

    let mut ycrcb = Mat::default();
    imgproc::cvt_color_def(&thumb, &mut ycrcb, imgproc::COLOR_BGR2YCrCb)
        .map_err(|e| MediaError::metric(format!("ycrcb conversion: {e}")))?;
    Ok(ycrcb)
}

/// 32-bin L1-normalized histogram of one 8-bit channel.
fn channel_histogram(channel: &Mat) -> MediaResult<Mat> {
    let mut images = Vector::<Mat>::new();
    images.push(channel.clone());
    let channels = Vector::from_slice(&[0]);
    let hist_size = Vector::from_slice(&[HIST_BINS]);
    let ranges = Vector::from_slice(&[0.0f32, 256.0]);

    let mut hist = Mat::default();
    imgproc::calc_hist(&images, &channels, &Mat::default(), &mut hist, &hist_size, &ranges, false)
        .map_err(|e| MediaError::metric(format!("calcHist: {e}")))?;

    let mut normalized = Mat::default();
    core::normalize(&hist, &mut normalized, 1.0, 0.0, core::NORM_L1, -1, &core::no_array())
        .map_err(|e| MediaError::metric(format!("hist normalize: {e}")))?;
    Ok(normalized)
}

fn map_cv(e: opencv::Error) -> MediaError {
    MediaError::metric(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MetricSet;
    use opencv::core::Scalar;

    fn frame_with(color: (f64, f64, f64), faces: Vec<PixelBox>) -> FrameMetrics {
        let image = Mat::new_rows_cols_with_default(
            90,
            160,
            core::CV_8UC3,
            Scalar::new(color.0, color.1, color.2, 0.0),
        )
        .unwrap();
        FrameMetrics {
            t: 0.0,
            full: image.try_clone().unwrap(),
            analysis: image,
            faces,
            raw: MetricSet::default(),
            norm: MetricSet::default(),
            score: 0.0,
            saved_path: None,
        }
    }

    #[test]
    fn test_face_overlap() {
        let a = vec![PixelBox::new(0.0, 0.0, 10.0, 10.0)];
        assert_eq!(face_overlap(&a, &[]), 0.0);
        assert_eq!(face_overlap(&[], &a), 0.0);
        assert!((face_overlap(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_frames_distance_is_face_term_only() {
        let a = frame_with((40.0, 90.0, 200.0), Vec::new());
        let b = frame_with((40.0, 90.0, 200.0), Vec::new());
        // Color distance 0, face overlap 0 => (0 + 1) / 2
        let distance = appearance_distance(&a, &b).unwrap();
        assert!((distance - 0.5).abs() < 1e-6, "distance {distance}");
    }

    #[test]
    fn test_different_colors_increase_distance() {
        let a = frame_with((20.0, 20.0, 20.0), Vec::new());
        let b = frame_with((240.0, 240.0, 240.0), Vec::new());
        let same = appearance_distance(&a, &a).unwrap();
        let different = appearance_distance(&a, &b).unwrap();
        assert!(different > same);
    }

    #[test]
    fn test_shared_face_lowers_distance() {
        let face = vec![PixelBox::new(30.0, 30.0, 40.0, 40.0)];
        let a = frame_with((100.0, 100.0, 100.0), face.clone());
        let b = frame_with((100.0, 100.0, 100.0), face);
        let distance = appearance_distance(&a, &b).unwrap();
        // Identical color and identical largest face => 0
        assert!(distance < 1e-6, "distance {distance}");
    }
}
