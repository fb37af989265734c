//! Manifest assembly and artifact writing.
//!
//! Writes every evaluated frame under `frames/`, each pick and its
//! neighbors under `candidates/`, and the manifest JSON tying them
//! together. File stems encode the sample time as zero-padded seconds
//! with millisecond precision.

use vthumb_models::CropRect;

#[cfg(feature = "opencv")]
use std::fs;
#[cfg(feature = "opencv")]
use std::path::{Path, PathBuf};

#[cfg(feature = "opencv")]
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
};
#[cfg(feature = "opencv")]
use tracing::info;

#[cfg(feature = "opencv")]
use vthumb_media::{FrameMetrics, MetricKind};
#[cfg(feature = "opencv")]
use vthumb_models::{
    FrameScore, Manifest, ManifestParameters, ManifestVideo, NeighborPick, TopPick, VideoMetadata,
};

#[cfg(feature = "opencv")]
use crate::error::{PipelineError, PipelineResult};
#[cfg(feature = "opencv")]
use crate::neighbors::NeighborFrame;

/// Tolerance when deciding whether a frame is already 16:9.
const ASPECT_EPSILON: f64 = 0.01;

/// Format a sample time as the zero-padded file stem `000012.345`.
pub fn frame_stamp(t: f64) -> String {
    format!("{t:010.3}")
}

/// File name for a sampled frame image.
pub fn frame_file_name(t: f64) -> String {
    format!("f_{}.png", frame_stamp(t))
}

/// File name for a candidate image (`main`, `p{o}`, or `m{o}` suffix).
pub fn candidate_file_name(t: f64, suffix: &str) -> String {
    format!("c_{}_{}.png", frame_stamp(t), suffix)
}

/// Suffix for a neighbor offset: `p{o}` for positive, `m{|o|}` for negative.
pub fn neighbor_suffix(offset: i32) -> String {
    if offset >= 0 {
        format!("p{offset}")
    } else {
        format!("m{}", -offset)
    }
}

/// Largest centered 16:9 crop that fits the frame.
///
/// Frames already within 1% of 16:9 get the full frame.
pub fn suggested_crop(width: u32, height: u32) -> CropRect {
    let w = width as f64;
    let h = height as f64;
    if w <= 0.0 || h <= 0.0 {
        return CropRect { x: 0, y: 0, width: width as i32, height: height as i32 };
    }

    if (w / h - 16.0 / 9.0).abs() < ASPECT_EPSILON {
        return CropRect { x: 0, y: 0, width: width as i32, height: height as i32 };
    }

    let mut crop_w = w;
    let mut crop_h = w * 9.0 / 16.0;
    if crop_h > h {
        crop_h = h;
        crop_w = h * 16.0 / 9.0;
    }

    CropRect {
        x: ((w - crop_w) / 2.0) as i32,
        y: ((h - crop_h) / 2.0) as i32,
        width: crop_w as i32,
        height: crop_h as i32,
    }
}

/// Persist all artifacts and assemble the manifest.
///
/// Creates `frames/` and `candidates/` under the output directory, saves
/// every evaluated frame plus the picks and their neighbors, fills in
/// each frame's saved path, and writes `manifest.json`. Returns the
/// manifest and its path.
#[cfg(feature = "opencv")]
#[allow(clippy::too_many_arguments)]
pub fn write_outputs(
    out_dir: &Path,
    video: &VideoMetadata,
    preset_name: &str,
    resolved_fps: f64,
    top_k: usize,
    neighbor_count: usize,
    frames: &mut [FrameMetrics],
    selected: &[usize],
    neighbor_groups: &[Vec<NeighborFrame>],
) -> PipelineResult<(Manifest, PathBuf)> {
    let frames_dir = out_dir.join("frames");
    let candidates_dir = out_dir.join("candidates");
    fs::create_dir_all(&frames_dir)
        .map_err(|e| PipelineError::write_failed(&frames_dir, e.to_string()))?;
    fs::create_dir_all(&candidates_dir)
        .map_err(|e| PipelineError::write_failed(&candidates_dir, e.to_string()))?;

    // Every evaluated frame image, full resolution
    for frame in frames.iter_mut() {
        let relative = format!("frames/{}", frame_file_name(frame.t));
        save_image(&out_dir.join(&relative), &frame.full)?;
        if frame.saved_path.is_none() {
            frame.saved_path = Some(relative);
        }
    }

    let scores: Vec<FrameScore> = frames.iter().map(frame_score_record).collect();

    // Picks and their neighbor strips
    let crop = suggested_crop(video.width, video.height);
    let mut top = Vec::with_capacity(selected.len());
    for (slot, &index) in selected.iter().enumerate() {
        let frame = &frames[index];
        let main_relative = format!("candidates/{}", candidate_file_name(frame.t, "main"));
        save_image(&out_dir.join(&main_relative), &frame.full)?;

        let mut neighbors = Vec::new();
        if let Some(group) = neighbor_groups.get(slot) {
            for neighbor in group {
                let relative = format!(
                    "candidates/{}",
                    candidate_file_name(frame.t, &neighbor_suffix(neighbor.offset))
                );
                save_image(&out_dir.join(&relative), &neighbor.frame.full)?;
                neighbors.push(NeighborPick { dt: neighbor.offset, path: relative });
            }
        }

        top.push(TopPick {
            t: frame.t,
            score: frame.score,
            path: main_relative,
            neighbors,
            suggested_crop: crop,
        });
    }

    let manifest = Manifest {
        video: ManifestVideo {
            path: video.path.clone(),
            duration_sec: video.duration_sec,
            fps: video.fps,
            width: video.width,
            height: video.height,
        },
        preset: preset_name.to_string(),
        parameters: ManifestParameters { fps: resolved_fps, top: top_k, neighbors: neighbor_count },
        frames_analyzed: frames.len(),
        scores,
        top,
    };

    let manifest_path = out_dir.join("manifest.json");
    let body = serde_json::to_string_pretty(&manifest)?;
    fs::write(&manifest_path, body)
        .map_err(|e| PipelineError::write_failed(&manifest_path, e.to_string()))?;

    info!(
        path = %manifest_path.display(),
        frames = manifest.frames_analyzed,
        picks = manifest.top.len(),
        "Manifest written"
    );

    Ok((manifest, manifest_path))
}

#[cfg(feature = "opencv")]
fn save_image(path: &Path, image: &Mat) -> PipelineResult<()> {
    if image.empty() {
        return Err(PipelineError::write_failed(path, "frame buffer already released"));
    }
    let written = imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::new())
        .map_err(|e| PipelineError::write_failed(path, e.to_string()))?;
    if !written {
        return Err(PipelineError::write_failed(path, "encoder refused the image"));
    }
    Ok(())
}

#[cfg(feature = "opencv")]
fn frame_score_record(frame: &FrameMetrics) -> FrameScore {
    FrameScore {
        t: frame.t,
        sharp: frame.norm.get(MetricKind::Sharpness),
        sharp_raw: frame.raw.get(MetricKind::Sharpness),
        exposure: frame.norm.get(MetricKind::Exposure),
        exposure_raw: frame.raw.get(MetricKind::Exposure),
        contrast: frame.norm.get(MetricKind::Contrast),
        contrast_raw: frame.raw.get(MetricKind::Contrast),
        color: frame.norm.get(MetricKind::Colorfulness),
        color_raw: frame.raw.get(MetricKind::Colorfulness),
        face: frame.norm.get(MetricKind::Face),
        face_raw: frame.raw.get(MetricKind::Face),
        centrality: frame.norm.get(MetricKind::Centrality),
        centrality_raw: frame.raw.get(MetricKind::Centrality),
        clutter: frame.norm.get(MetricKind::Clutter),
        clutter_raw: frame.raw.get(MetricKind::Clutter),
        overlay: frame.norm.get(MetricKind::Overlay),
        overlay_raw: frame.raw.get(MetricKind::Overlay),
        motion: frame.norm.get(MetricKind::Motion),
        motion_raw: frame.raw.get(MetricKind::Motion),
        time: frame.norm.get(MetricKind::TimePrior),
        time_raw: frame.raw.get(MetricKind::TimePrior),
        score: frame.score,
        path: frame.saved_path.clone().unwrap_or_default(),
    }
}
