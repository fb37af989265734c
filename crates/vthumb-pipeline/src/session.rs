//! Single-run pipeline session.
//!
//! Owns one pass over one video: validate options, open the source,
//! sample and evaluate frames, normalize and score the corpus, apply
//! the hard gates, select a diverse top K, fetch neighbors, and write
//! the manifest. The pipeline is strictly sequential; hosts that need a
//! responsive UI run the session on a worker thread via
//! [`Session::spawn`].

use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{info, warn};

use vthumb_media::{appearance_distance, FrameMetrics, MetricsEngine, OpenCvVideoSource, VideoSource};
use vthumb_models::{Manifest, PresetDefinition, SessionOptions, VideoMetadata};

use crate::error::{PipelineError, PipelineResult};
use crate::manifest::write_outputs;
use crate::neighbors::{default_offsets, fetch_neighbors, NeighborFrame};
use crate::progress::{noop_progress, ProgressCallback, ProgressEvent, Stage};
use crate::ranker::{select_diverse, RankCandidate};
use crate::timestamps::sample_times;

/// Sampling fallback when neither the options nor the preset name a rate.
const DEFAULT_MAX_SAMPLE_HZ: f64 = 2.0;

/// Counters for one completed (or failed) run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Frames successfully decoded and evaluated.
    pub frames_sampled: usize,
    /// Timestamps where the decoder returned nothing.
    pub decode_skips: usize,
    /// Frames removed by the hard gates.
    pub rejected: usize,
    /// Picks returned by the ranker.
    pub selected: usize,
    /// Neighbor frames fetched and saved.
    pub neighbors_fetched: usize,
    /// Wall-clock time of the run.
    pub elapsed_ms: u64,
}

impl SessionStats {
    /// Log a one-line summary of the run.
    pub fn log_summary(&self) {
        info!(
            frames = self.frames_sampled,
            skips = self.decode_skips,
            rejected = self.rejected,
            selected = self.selected,
            neighbors = self.neighbors_fetched,
            elapsed_ms = self.elapsed_ms,
            "Session finished"
        );
    }
}

/// One pipeline run over one video.
pub struct Session {
    options: SessionOptions,
    preset: PresetDefinition,
    progress: ProgressCallback,
}

impl Session {
    /// Create a session with no progress reporting.
    pub fn new(options: SessionOptions, preset: PresetDefinition) -> Self {
        Self { options, preset, progress: noop_progress() }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve the effective sample rate in Hz.
    ///
    /// Order: explicit option, preset sampling policy (`fps` as-is,
    /// `fpm` divided by 60), then `min(video_fps, 2.0)`.
    pub fn resolved_sample_rate(&self, video_fps: f64) -> f64 {
        if let Some(rate) = self.options.sample_rate {
            return rate;
        }
        if let Some(sampling) = &self.preset.sampling {
            return sampling.rate_hz();
        }
        video_fps.min(DEFAULT_MAX_SAMPLE_HZ)
    }

    /// Run the full pipeline to completion, opening the input video
    /// through the OpenCV decoder.
    ///
    /// The session owns the source for the duration of the run; a file
    /// that no decoder backend accepts fails here with the open error.
    pub fn run(&self, engine: &mut MetricsEngine) -> PipelineResult<Manifest> {
        self.validate_options()?;
        self.emit(ProgressEvent::indeterminate(Stage::OpeningVideo));
        let mut source = OpenCvVideoSource::open(&self.options.input)?;
        self.run_pipeline(&mut source, engine)
    }

    /// Run against an injected source capability instead of opening the
    /// input file. The seam for hosts that bring their own decoder and
    /// for tests that substitute synthetic frames.
    pub fn run_with_source(
        &self,
        source: &mut dyn VideoSource,
        engine: &mut MetricsEngine,
    ) -> PipelineResult<Manifest> {
        self.validate_options()?;
        self.emit(ProgressEvent::indeterminate(Stage::OpeningVideo));
        self.run_pipeline(source, engine)
    }

    /// Run the session on a dedicated worker thread. The video is opened
    /// on that thread, not the caller's.
    pub fn spawn(self, mut engine: MetricsEngine) -> JoinHandle<PipelineResult<Manifest>> {
        thread::spawn(move || self.run(&mut engine))
    }

    /// Drive the stages and release every frame buffer on the way out,
    /// on success and on failure alike. Only per-frame decode misses are
    /// tolerated; every other component failure aborts the run.
    fn run_pipeline(
        &self,
        source: &mut dyn VideoSource,
        engine: &mut MetricsEngine,
    ) -> PipelineResult<Manifest> {
        let started = Instant::now();
        let mut frames: Vec<FrameMetrics> = Vec::new();
        let mut neighbor_groups: Vec<Vec<NeighborFrame>> = Vec::new();
        let mut stats = SessionStats::default();

        let result = self.run_stages(source, engine, &mut frames, &mut neighbor_groups, &mut stats);

        for frame in frames.iter_mut() {
            frame.release_images();
        }
        for group in neighbor_groups.iter_mut() {
            for neighbor in group.iter_mut() {
                neighbor.frame.release_images();
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        stats.log_summary();
        result
    }

    fn run_stages(
        &self,
        source: &mut dyn VideoSource,
        engine: &mut MetricsEngine,
        frames: &mut Vec<FrameMetrics>,
        neighbor_groups: &mut Vec<Vec<NeighborFrame>>,
        stats: &mut SessionStats,
    ) -> PipelineResult<Manifest> {
        let metadata: VideoMetadata = source.metadata().clone();
        info!(
            path = %metadata.path,
            duration = format!("{:.2}", metadata.duration_sec),
            fps = format!("{:.2}", metadata.fps),
            width = metadata.width,
            height = metadata.height,
            preset = %self.preset.name,
            "Session started"
        );

        for warning in self.preset.validate().into_iter().chain(engine.warnings()) {
            warn!("{warning}");
            self.emit(ProgressEvent::indeterminate(Stage::ConfigurationWarning).with_detail(warning));
        }

        let sample_rate = self.resolved_sample_rate(metadata.fps);
        if sample_rate <= 0.0 {
            return Err(PipelineError::config_invalid(format!(
                "resolved sample rate must be > 0, got {sample_rate}"
            )));
        }

        // Stage: sampling
        let times = sample_times(metadata.duration_sec, sample_rate);
        let total = times.len() as i64;
        self.emit(ProgressEvent::counted(Stage::SamplingFrames, 0, total));
        for (i, &t) in times.iter().enumerate() {
            match source.seek_and_read(t)? {
                Some(image) => {
                    let frame =
                        engine.evaluate(t, image, metadata.duration_sec, &self.preset.overlay_zones)?;
                    frames.push(frame);
                }
                None => {
                    stats.decode_skips += 1;
                }
            }
            self.emit(ProgressEvent::counted(Stage::SamplingFrames, (i + 1) as i64, total));
        }
        stats.frames_sampled = frames.len();

        // Stage: scoring
        self.emit(ProgressEvent::indeterminate(Stage::ScoringFrames));
        engine.normalize_and_score(frames, &self.preset.weights);

        let eligible: Vec<RankCandidate> = frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| {
                !engine.hard_rejected(frame, &self.preset.thresholds, self.preset.require_face)
            })
            .map(|(index, frame)| RankCandidate { index, t: frame.t, score: frame.score })
            .collect();
        stats.rejected = frames.len() - eligible.len();
        info!(
            frames = frames.len(),
            eligible = eligible.len(),
            rejected = stats.rejected,
            "Scoring complete"
        );

        // Stage: selection
        self.emit(ProgressEvent::indeterminate(Stage::SelectingCandidates));
        let selected = select_diverse(
            &eligible,
            self.options.top_k,
            self.preset.thresholds.temporal_min_gap_sec,
            self.preset.thresholds.appearance_min_dist,
            |a, b| match appearance_distance(&frames[a], &frames[b]) {
                Ok(distance) => distance,
                Err(e) => {
                    warn!("Appearance distance failed, treating frames as lookalikes: {e}");
                    0.0
                }
            },
        );
        stats.selected = selected.len();

        // Stage: neighbors
        self.emit(ProgressEvent::indeterminate(Stage::FetchingNeighbors));
        let offsets = match &self.options.neighbor_offsets {
            Some(offsets) => offsets.clone(),
            None => default_offsets(self.options.neighbor_count),
        };
        let candidate_times: Vec<f64> = selected.iter().map(|&i| frames[i].t).collect();
        *neighbor_groups = fetch_neighbors(
            source,
            engine,
            &candidate_times,
            &offsets,
            sample_rate,
            metadata.duration_sec,
            &self.preset.overlay_zones,
        )?;
        stats.neighbors_fetched = neighbor_groups.iter().map(Vec::len).sum();

        // Stage: manifest
        self.emit(ProgressEvent::indeterminate(Stage::WritingManifest));
        let (manifest, manifest_path) = write_outputs(
            &self.options.output_dir,
            &metadata,
            &self.preset.name,
            sample_rate,
            self.options.top_k,
            self.options.neighbor_count,
            frames,
            &selected,
            neighbor_groups,
        )?;

        self.emit(
            ProgressEvent::indeterminate(Stage::Completed)
                .with_detail(manifest_path.display().to_string()),
        );
        Ok(manifest)
    }

    fn validate_options(&self) -> PipelineResult<()> {
        if !self.options.input.exists() {
            return Err(PipelineError::config_invalid(format!(
                "input file does not exist: {}",
                self.options.input.display()
            )));
        }
        if self.options.top_k == 0 {
            return Err(PipelineError::config_invalid("top K must be > 0"));
        }
        if let Some(rate) = self.options.sample_rate {
            if rate <= 0.0 {
                return Err(PipelineError::config_invalid(format!(
                    "sample rate must be > 0, got {rate}"
                )));
            }
        }
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        (self.progress)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vthumb_models::{SamplingMode, SamplingPolicy};

    fn session_with(sample_rate: Option<f64>, sampling: Option<SamplingPolicy>) -> Session {
        let mut options = SessionOptions::new("in.mp4", "/tmp/out");
        options.sample_rate = sample_rate;
        let preset = PresetDefinition { sampling, ..Default::default() };
        Session::new(options, preset)
    }

    #[test]
    fn test_sample_rate_resolution_order() {
        // Explicit option wins over everything
        let session = session_with(
            Some(4.0),
            Some(SamplingPolicy { mode: SamplingMode::Fps, value: 1.0 }),
        );
        assert_eq!(session.resolved_sample_rate(30.0), 4.0);

        // Preset fps mode uses the value as-is
        let session =
            session_with(None, Some(SamplingPolicy { mode: SamplingMode::Fps, value: 1.5 }));
        assert_eq!(session.resolved_sample_rate(30.0), 1.5);

        // Preset fpm mode divides by 60
        let session =
            session_with(None, Some(SamplingPolicy { mode: SamplingMode::Fpm, value: 30.0 }));
        assert!((session.resolved_sample_rate(30.0) - 0.5).abs() < 1e-9);

        // No policy: min(video fps, 2.0)
        let session = session_with(None, None);
        assert_eq!(session.resolved_sample_rate(30.0), 2.0);
        assert_eq!(session.resolved_sample_rate(1.0), 1.0);
    }

    #[test]
    fn test_validation_rejects_bad_options() {
        let mut options = SessionOptions::new("/definitely/not/here.mp4", "/tmp/out");
        options.top_k = 0;
        let session = Session::new(options, PresetDefinition::default());
        assert!(matches!(
            session.validate_options(),
            Err(PipelineError::ConfigInvalid(_))
        ));
    }
}
