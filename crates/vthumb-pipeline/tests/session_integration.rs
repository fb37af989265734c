//! End-to-end session runs against a synthetic video source.

#![cfg(feature = "opencv")]

use std::sync::{Arc, Mutex};

use opencv::{
    core::{self, Mat, Rect, Scalar},
    imgproc,
};
use tempfile::TempDir;

use vthumb_media::{
    DetectMode, FaceDetector, MediaResult, MetricsConfig, MetricsEngine, VideoSource,
};
use vthumb_models::{
    PixelBox, HardThresholds, Manifest, PresetDefinition, SessionOptions, VideoMetadata,
};
use vthumb_pipeline::{ProgressEvent, Session, Stage};

/// Deterministic frame generator standing in for a decoder.
///
/// Frames are a flat background whose shade drifts with time plus a
/// bright square sweeping horizontally, so sharpness, motion, and
/// appearance all vary across the timeline.
struct SyntheticSource {
    metadata: VideoMetadata,
    /// Seeks inside this window read nothing, simulating decode misses.
    dead_zone: Option<(f64, f64)>,
}

impl SyntheticSource {
    fn new(duration_sec: f64) -> Self {
        Self {
            metadata: VideoMetadata {
                path: "synthetic.mp4".to_string(),
                duration_sec,
                fps: 30.0,
                width: 320,
                height: 180,
            },
            dead_zone: None,
        }
    }
}

impl VideoSource for SyntheticSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn seek_and_read(&mut self, time_sec: f64) -> MediaResult<Option<Mat>> {
        if time_sec < 0.0 || time_sec > self.metadata.duration_sec {
            return Ok(None);
        }
        if let Some((from, to)) = self.dead_zone {
            if time_sec >= from && time_sec <= to {
                return Ok(None);
            }
        }

        let shade = 60.0 + (time_sec * 12.0) % 160.0;
        let mut frame = Mat::new_rows_cols_with_default(
            180,
            320,
            core::CV_8UC3,
            Scalar::new(shade, shade * 0.8, shade * 0.6, 0.0),
        )
        .map_err(|e| vthumb_media::MediaError::decode(e.to_string()))?;

        let x = 10 + ((time_sec * 24.0) as i32 % 240);
        imgproc::rectangle(
            &mut frame,
            Rect::new(x, 60, 60, 60),
            Scalar::new(235.0, 235.0, 235.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .map_err(|e| vthumb_media::MediaError::decode(e.to_string()))?;

        Ok(Some(frame))
    }
}

/// Detector returning a canned face list for every frame.
struct CannedFaces(Vec<PixelBox>);

impl FaceDetector for CannedFaces {
    fn detect(&mut self, _gray: &Mat, _mode: DetectMode) -> MediaResult<Vec<PixelBox>> {
        Ok(self.0.clone())
    }
}

fn relaxed_preset() -> PresetDefinition {
    PresetDefinition {
        thresholds: HardThresholds {
            sharp_min: 0.0,
            l_min: 0.0,
            l_max: 255.0,
            temporal_min_gap_sec: 1.0,
            appearance_min_dist: 0.0,
        },
        ..Default::default()
    }
}

fn options_in(dir: &TempDir) -> SessionOptions {
    // The input only has to exist; frames come from the synthetic source.
    let input = dir.path().join("input.mp4");
    std::fs::write(&input, b"synthetic").unwrap();
    let mut options = SessionOptions::new(input, dir.path().join("out"));
    options.top_k = 3;
    options.neighbor_count = 1;
    options
}

fn engine_with_face() -> MetricsEngine {
    let face = PixelBox::new(120.0, 50.0, 70.0, 70.0);
    MetricsEngine::new(Box::new(CannedFaces(vec![face])), MetricsConfig::default())
}

#[test]
fn full_run_writes_manifest_and_respects_diversity() {
    let dir = TempDir::new().unwrap();
    let options = options_in(&dir);
    let out_dir = options.output_dir.clone();

    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let session = Session::new(options, relaxed_preset())
        .with_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));

    let mut source = SyntheticSource::new(10.0);
    let mut engine = engine_with_face();
    let manifest = session.run_with_source(&mut source, &mut engine).unwrap();

    // Sampling resolves to min(30 fps, 2.0) = 2 Hz over 10 s => 21 frames
    assert_eq!(manifest.frames_analyzed, 21);
    assert_eq!(manifest.scores.len(), 21);
    assert!((manifest.parameters.fps - 2.0).abs() < 1e-9);
    assert_eq!(manifest.parameters.top, 3);
    assert_eq!(manifest.parameters.neighbors, 1);

    // Picks respect the temporal gap
    assert!(!manifest.top.is_empty());
    assert!(manifest.top.len() <= 3);
    for (i, a) in manifest.top.iter().enumerate() {
        for b in manifest.top.iter().skip(i + 1) {
            assert!((a.t - b.t).abs() >= 1.0, "picks at {} and {} too close", a.t, b.t);
        }
    }

    // Neighbor strips are sorted by offset and limited to +/-1
    for pick in &manifest.top {
        assert!(!pick.neighbors.is_empty());
        let offsets: Vec<i32> = pick.neighbors.iter().map(|n| n.dt).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
        assert!(offsets.iter().all(|&dt| dt == -1 || dt == 1));
        // The suggested crop covers the full already-16:9 synthetic frame
        assert_eq!(pick.suggested_crop.width, 320);
        assert_eq!(pick.suggested_crop.height, 180);
    }

    // Normalized metrics are within the unit interval
    for record in &manifest.scores {
        for value in [
            record.sharp, record.exposure, record.contrast, record.color, record.face,
            record.centrality, record.clutter, record.overlay, record.motion, record.time,
        ] {
            assert!((0.0..=1.0).contains(&value), "normalized value out of range: {value}");
        }
        assert!(record.path.starts_with("frames/f_"));
        assert!(out_dir.join(&record.path).exists());
    }

    // Artifacts on disk
    let manifest_path = out_dir.join("manifest.json");
    assert!(manifest_path.exists());
    for pick in &manifest.top {
        assert!(out_dir.join(&pick.path).exists());
        for neighbor in &pick.neighbors {
            assert!(out_dir.join(&neighbor.path).exists());
        }
    }

    // Round trip: parse the file, compare, and re-serialize byte-identically
    let parsed = Manifest::from_path(&manifest_path).unwrap();
    assert_eq!(parsed, manifest);
    let on_disk = std::fs::read_to_string(&manifest_path).unwrap();
    assert_eq!(serde_json::to_string_pretty(&parsed).unwrap(), on_disk);

    // Progress: starts by opening, ends completed with the manifest path
    let events = events.lock().unwrap();
    assert_eq!(events.first().unwrap().stage, Stage::OpeningVideo);
    let last = events.last().unwrap();
    assert_eq!(last.stage, Stage::Completed);
    assert!(last.detail.as_deref().unwrap().contains("manifest.json"));
    let sampling_total: Vec<i64> = events
        .iter()
        .filter(|e| e.stage == Stage::SamplingFrames)
        .map(|e| e.maximum)
        .collect();
    assert!(sampling_total.iter().all(|&m| m == 21));
}

#[test]
fn decode_misses_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let options = options_in(&dir);

    let session = Session::new(options, relaxed_preset());
    let mut source = SyntheticSource::new(10.0);
    source.dead_zone = Some((3.0, 5.0));
    let mut engine = engine_with_face();

    let manifest = session.run_with_source(&mut source, &mut engine).unwrap();
    // 2 Hz sampling loses the five samples at 3.0, 3.5, 4.0, 4.5, 5.0
    assert_eq!(manifest.frames_analyzed, 16);
    assert!(!manifest.top.is_empty());
}

#[test]
fn require_face_rejects_faceless_corpus() {
    let dir = TempDir::new().unwrap();
    let options = options_in(&dir);
    let out_dir = options.output_dir.clone();

    let preset = PresetDefinition { require_face: true, ..relaxed_preset() };
    let session = Session::new(options, preset);

    let mut source = SyntheticSource::new(10.0);
    let mut engine = MetricsEngine::new(Box::new(CannedFaces(Vec::new())), MetricsConfig::default());

    let manifest = session.run_with_source(&mut source, &mut engine).unwrap();
    assert_eq!(manifest.frames_analyzed, 21);
    assert!(manifest.top.is_empty());
    // Frames are still analyzed, saved, and listed
    assert_eq!(manifest.scores.len(), 21);
    assert!(out_dir.join("manifest.json").exists());
}

#[test]
fn invalid_options_fail_before_any_decode() {
    let dir = TempDir::new().unwrap();
    let mut options = options_in(&dir);
    options.top_k = 0;

    let session = Session::new(options, relaxed_preset());
    let mut source = SyntheticSource::new(10.0);
    let mut engine = engine_with_face();

    let result = session.run_with_source(&mut source, &mut engine);
    assert!(matches!(result, Err(vthumb_pipeline::PipelineError::ConfigInvalid(_))));
}

#[test]
fn unopenable_input_surfaces_open_error() {
    let dir = TempDir::new().unwrap();
    // The input exists but is not a video; no decoder backend accepts it,
    // so the session's own open step must fail.
    let options = options_in(&dir);
    let session = Session::new(options, relaxed_preset());
    let mut engine = engine_with_face();

    let result = session.run(&mut engine);
    assert!(matches!(
        result,
        Err(vthumb_pipeline::PipelineError::Media(
            vthumb_media::MediaError::OpenFailed { .. }
        ))
    ));
}

#[test]
fn explicit_offsets_override_neighbor_count() {
    let dir = TempDir::new().unwrap();
    let mut options = options_in(&dir);
    options.top_k = 1;
    options.neighbor_offsets = Some(vec![2, -2]);

    let session = Session::new(options, relaxed_preset());
    let mut source = SyntheticSource::new(10.0);
    let mut engine = engine_with_face();

    let manifest = session.run_with_source(&mut source, &mut engine).unwrap();
    assert_eq!(manifest.top.len(), 1);
    let offsets: Vec<i32> = manifest.top[0].neighbors.iter().map(|n| n.dt).collect();
    assert!(offsets.iter().all(|&dt| dt == -2 || dt == 2));
}
