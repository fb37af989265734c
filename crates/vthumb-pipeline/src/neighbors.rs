//! Neighbor-frame offsets and fetching.

#[cfg(feature = "opencv")]
use tracing::debug;

#[cfg(feature = "opencv")]
use vthumb_media::{FrameMetrics, MetricsEngine, VideoSource};
#[cfg(feature = "opencv")]
use vthumb_models::OverlayZone;

#[cfg(feature = "opencv")]
use crate::error::PipelineResult;

/// Guard against a zero sample rate when converting offsets to seconds.
const MIN_SAMPLE_RATE: f64 = 1e-6;

/// Generate the default offset list `{±1, ±2, …, ±n}`, ordered by
/// absolute value and then sign (`-1, 1, -2, 2, …`).
pub fn default_offsets(neighbor_count: usize) -> Vec<i32> {
    let mut offsets = Vec::with_capacity(neighbor_count * 2);
    for n in 1..=neighbor_count as i32 {
        offsets.push(-n);
        offsets.push(n);
    }
    offsets
}

/// One fetched neighbor of a selected candidate.
#[cfg(feature = "opencv")]
#[derive(Debug)]
pub struct NeighborFrame {
    /// Signed offset in sample intervals from the owning candidate.
    pub offset: i32,
    pub frame: FrameMetrics,
}

/// Fetch and evaluate the neighbors of each selected candidate.
///
/// Offsets are expressed in sample intervals; times before the start of
/// the video and failed reads are skipped. Neighbors run through the
/// engine's single-frame path; they are never normalized against the
/// main corpus, and the engine's motion state is knowingly perturbed.
/// Results are grouped per candidate, sorted by offset ascending.
#[cfg(feature = "opencv")]
#[allow(clippy::too_many_arguments)]
pub fn fetch_neighbors(
    source: &mut dyn VideoSource,
    engine: &mut MetricsEngine,
    candidate_times: &[f64],
    offsets: &[i32],
    sample_rate_hz: f64,
    duration_sec: f64,
    zones: &[OverlayZone],
) -> PipelineResult<Vec<Vec<NeighborFrame>>> {
    let interval = 1.0 / sample_rate_hz.max(MIN_SAMPLE_RATE);
    let mut groups = Vec::with_capacity(candidate_times.len());

    for &candidate_t in candidate_times {
        let mut group: Vec<NeighborFrame> = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            let t = candidate_t + offset as f64 * interval;
            if t < 0.0 {
                continue;
            }
            let image = match source.seek_and_read(t)? {
                Some(image) => image,
                None => {
                    debug!(t = format!("{t:.3}"), offset, "Neighbor read missed; skipping");
                    continue;
                }
            };
            let frame = engine.evaluate(t, image, duration_sec, zones)?;
            group.push(NeighborFrame { offset, frame });
        }
        group.sort_by_key(|n| n.offset);
        groups.push(group);
    }

    Ok(groups)
}
