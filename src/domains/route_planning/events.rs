use super::pipeline::PlanStage;
use super::types::{Coordinate, RouteConfig};
use crate::common::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutePlanningEvent {
    PlanRequested {
        fingerprint: String,
        region: String,
        start: Coordinate,
        end: Coordinate,
        config: RouteConfig,
        timestamp: DateTime<Utc>,
    },
    StageEntered {
        fingerprint: String,
        stage: PlanStage,
        timestamp: DateTime<Utc>,
    },
    PlanCompleted {
        fingerprint: String,
        from_cache: bool,
        length_m: f64,
        exposure_score: f64,
        privacy_gain: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    PlanFailed {
        fingerprint: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for RoutePlanningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RoutePlanningEvent::PlanRequested { .. } => "PlanRequested",
            RoutePlanningEvent::StageEntered { .. } => "StageEntered",
            RoutePlanningEvent::PlanCompleted { .. } => "PlanCompleted",
            RoutePlanningEvent::PlanFailed { .. } => "PlanFailed",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            RoutePlanningEvent::PlanRequested { fingerprint, .. } => fingerprint,
            RoutePlanningEvent::StageEntered { fingerprint, .. } => fingerprint,
            RoutePlanningEvent::PlanCompleted { fingerprint, .. } => fingerprint,
            RoutePlanningEvent::PlanFailed { fingerprint, .. } => fingerprint,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RoutePlanningEvent::PlanRequested { timestamp, .. } => *timestamp,
            RoutePlanningEvent::StageEntered { timestamp, .. } => *timestamp,
            RoutePlanningEvent::PlanCompleted { timestamp, .. } => *timestamp,
            RoutePlanningEvent::PlanFailed { timestamp, .. } => *timestamp,
        }
    }
}
