use super::types::{Coordinate, NodeId};
use crate::common::{RouteError, RouteResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A candidate route after exposure scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRoute {
    /// Generation order; rank 1 is the pure shortest path.
    pub rank: usize,
    pub node_ids: Vec<NodeId>,
    pub geometry: Vec<Coordinate>,
    pub length_m: f64,
    /// Cameras per kilometre.
    pub exposure_score: f64,
    /// Camera points within the buffer, which may exceed the number of distinct ids.
    pub camera_count: usize,
    pub nearby_camera_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub best: ScoredRoute,
    pub baseline: ScoredRoute,
}

impl Selection {
    pub fn privacy_gain(&self) -> Option<f64> {
        privacy_gain(self.baseline.exposure_score, self.best.exposure_score)
    }
}

/// Relative exposure reduction of `best` against `baseline`; `None` when the
/// baseline has no exposure to reduce.
pub fn privacy_gain(baseline_score: f64, best_score: f64) -> Option<f64> {
    (baseline_score > 0.0).then(|| (baseline_score - best_score) / baseline_score)
}

/// Picks the least-exposed candidate and the shortest-path baseline.
///
/// Ties on exposure prefer the shorter route, then the earlier-generated one.
pub fn select(scored: &[ScoredRoute]) -> RouteResult<Selection> {
    let best = scored
        .iter()
        .min_by(|a, b| {
            a.exposure_score
                .total_cmp(&b.exposure_score)
                .then_with(|| a.length_m.total_cmp(&b.length_m))
                .then_with(|| a.rank.cmp(&b.rank))
        })
        .ok_or(RouteError::NoCandidates)?;
    let baseline = scored.iter().min_by_key(|r| r.rank).ok_or(RouteError::NoCandidates)?;

    tracing::info!(
        best_rank = best.rank,
        best_length_m = best.length_m,
        best_exposure = best.exposure_score,
        baseline_exposure = baseline.exposure_score,
        "selected route"
    );
    Ok(Selection { best: best.clone(), baseline: baseline.clone() })
}
