use super::candidates::{k_shortest_paths, CandidatePath};
use super::exposure::{self, CameraIndex};
use super::graph::StreetGraph;
use super::selector::{select, ScoredRoute, Selection};
use super::snapper::snap;
use super::types::{Coordinate, NodeId, RouteConfig};
use crate::common::RouteResult;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Observable stages of a planning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStage {
    Snapping,
    GeneratingCandidates,
    Scoring,
    Selecting,
    Cached,
}

/// State of the planning pipeline. Each variant owns exactly the data the next
/// transition consumes.
#[derive(Debug)]
pub enum PipelineState {
    Snapping,
    GeneratingCandidates { start: NodeId, end: NodeId },
    Scoring { candidates: Vec<CandidatePath> },
    Selecting { scored: Vec<ScoredRoute> },
    Selected(PipelineOutcome),
}

/// Final product of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub selection: Selection,
    /// Number of candidates that were scored.
    pub candidate_count: usize,
}

impl PipelineState {
    /// Stage reported while this state is being worked on; `None` once done.
    pub fn stage(&self) -> Option<PlanStage> {
        match self {
            PipelineState::Snapping => Some(PlanStage::Snapping),
            PipelineState::GeneratingCandidates { .. } => Some(PlanStage::GeneratingCandidates),
            PipelineState::Scoring { .. } => Some(PlanStage::Scoring),
            PipelineState::Selecting { .. } => Some(PlanStage::Selecting),
            PipelineState::Selected(_) => None,
        }
    }
}

/// Read-only inputs of one pipeline run.
pub struct PipelineInput<'a> {
    pub graph: &'a StreetGraph,
    pub cameras: &'a CameraIndex,
    pub start: Coordinate,
    pub end: Coordinate,
    pub config: &'a RouteConfig,
}

impl PipelineInput<'_> {
    /// Performs one deterministic transition.
    pub fn advance(&self, state: PipelineState) -> RouteResult<PipelineState> {
        Ok(match state {
            PipelineState::Snapping => {
                let start = snap(self.graph, &self.start, self.config.snap_threshold_m)?;
                let end = snap(self.graph, &self.end, self.config.snap_threshold_m)?;
                PipelineState::GeneratingCandidates { start, end }
            }
            PipelineState::GeneratingCandidates { start, end } => PipelineState::Scoring {
                candidates: k_shortest_paths(self.graph, start, end, self.config.candidate_count)?,
            },
            PipelineState::Scoring { candidates } => PipelineState::Selecting {
                scored: candidates.par_iter().map(|c| self.score_candidate(c)).collect(),
            },
            PipelineState::Selecting { scored } => PipelineState::Selected(PipelineOutcome {
                selection: select(&scored)?,
                candidate_count: scored.len(),
            }),
            done @ PipelineState::Selected(_) => done,
        })
    }

    /// Runs every transition, reporting each stage as it is entered.
    pub fn run(&self, mut on_stage: impl FnMut(PlanStage)) -> RouteResult<PipelineOutcome> {
        let mut state = PipelineState::Snapping;
        loop {
            if let PipelineState::Selected(outcome) = state {
                return Ok(outcome);
            }
            if let Some(stage) = state.stage() {
                on_stage(stage);
            }
            state = self.advance(state)?;
        }
    }

    fn score_candidate(&self, candidate: &CandidatePath) -> ScoredRoute {
        let geometry = self.graph.path_geometry(&candidate.nodes);
        let exposure = exposure::score(&geometry, candidate.length_m, self.cameras, self.config.buffer_radius_m);
        ScoredRoute {
            rank: candidate.rank,
            node_ids: self.graph.node_ids(&candidate.nodes),
            geometry,
            length_m: candidate.length_m,
            exposure_score: exposure.score,
            camera_count: exposure.camera_count,
            nearby_camera_ids: exposure.camera_ids,
        }
    }
}
