//! Greedy diverse top-K selection.

use std::cmp::Ordering;

use tracing::debug;

/// One eligible frame as the ranker sees it. `index` refers back into
/// the caller's corpus.
#[derive(Debug, Clone, Copy)]
pub struct RankCandidate {
    pub index: usize,
    pub t: f64,
    pub score: f64,
}

/// Greedily select up to `k` candidates in score order, accepting one
/// only if it keeps the minimum temporal gap and appearance distance to
/// every already-accepted frame.
///
/// `distance` is consulted with corpus indices and only when
/// `min_appearance_dist > 0`. Ties in score go to the earlier sample
/// time. Returns corpus indices in acceptance (score) order.
pub fn select_diverse<F>(
    candidates: &[RankCandidate],
    k: usize,
    min_gap_sec: f64,
    min_appearance_dist: f64,
    mut distance: F,
) -> Vec<usize>
where
    F: FnMut(usize, usize) -> f64,
{
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<&RankCandidate> = candidates.iter().collect();
    order.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.t.partial_cmp(&b.t).unwrap_or(Ordering::Equal))
    });

    let mut picked: Vec<&RankCandidate> = Vec::with_capacity(k);
    for candidate in order {
        if picked.len() >= k {
            break;
        }

        let diverse = picked.iter().all(|existing| {
            if (candidate.t - existing.t).abs() < min_gap_sec {
                return false;
            }
            if min_appearance_dist > 0.0
                && distance(candidate.index, existing.index) < min_appearance_dist
            {
                return false;
            }
            true
        });

        if diverse {
            picked.push(candidate);
        } else {
            debug!(
                t = format!("{:.3}", candidate.t),
                score = format!("{:.4}", candidate.score),
                "Candidate blocked by diversity constraints"
            );
        }
    }

    picked.into_iter().map(|c| c.index).collect()
}
