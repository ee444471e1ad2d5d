use super::actors::PlanEventPublisher;
use super::events::RoutePlanningEvent;
use super::exposure::CameraIndex;
use super::network_store::NetworkStore;
use super::pipeline::{PipelineInput, PlanStage};
use super::ports::CameraSource;
use super::result_cache::{CachedResult, PlanOutcome, ResultCache};
use super::types::{Coordinate, RegionKey, RequestFingerprint, RouteConfig};
use crate::common::{join_error, RouteError, RouteResult};
use crate::domains::logger::DynLogger;
use chrono::Utc;
use std::sync::Arc;

/// Entry point of the engine: plans the least-surveilled walking route
/// between two coordinates.
///
/// All shared state lives in the injected network store and result cache, so
/// several planners may share them and tests can build one in isolation.
pub struct RoutePlanner {
    networks: Arc<NetworkStore>,
    cameras: Arc<dyn CameraSource>,
    results: Arc<ResultCache>,
    logger: DynLogger,
    events: Option<PlanEventPublisher>,
}

impl RoutePlanner {
    pub fn new(
        networks: Arc<NetworkStore>,
        cameras: Arc<dyn CameraSource>,
        results: Arc<ResultCache>,
        logger: DynLogger,
    ) -> Self {
        Self { networks, cameras, results, logger, events: None }
    }

    pub fn with_events(mut self, publisher: PlanEventPublisher) -> Self {
        self.events = Some(publisher);
        self
    }

    pub fn networks(&self) -> &Arc<NetworkStore> {
        &self.networks
    }

    pub async fn plan_route(
        &self,
        region: &RegionKey,
        start: Coordinate,
        end: Coordinate,
        config: &RouteConfig,
    ) -> RouteResult<PlanOutcome> {
        config.validate()?;
        for (label, c) in [("start", &start), ("end", &end)] {
            if !c.is_valid() {
                return Err(RouteError::InvalidConfig {
                    reason: format!("{} coordinate ({}, {}) is out of range", label, c.lat, c.lon),
                });
            }
        }

        let fingerprint = RequestFingerprint::compute(region, self.networks.network_type(), &start, &end, config);
        self.publish(RoutePlanningEvent::PlanRequested {
            fingerprint: fingerprint.to_string(),
            region: region.to_string(),
            start,
            end,
            config: config.clone(),
            timestamp: Utc::now(),
        });
        self.logger.info(&format!("planning route in {} ({})", region, fingerprint));

        let outcome = self
            .results
            .get_or_compute(&fingerprint, || self.compute(region, start, end, config, &fingerprint))
            .await;

        match &outcome {
            Ok(outcome) => {
                let selected = &outcome.result.selected;
                if !outcome.from_cache {
                    self.stage_entered(&fingerprint, PlanStage::Cached);
                }
                self.publish(RoutePlanningEvent::PlanCompleted {
                    fingerprint: fingerprint.to_string(),
                    from_cache: outcome.from_cache,
                    length_m: selected.length_m,
                    exposure_score: selected.exposure_score,
                    privacy_gain: outcome.result.privacy_gain,
                    timestamp: Utc::now(),
                });
                self.logger.info(&format!(
                    "route {} ready: {:.0}m, {:.2} cameras/km{}",
                    fingerprint,
                    selected.length_m,
                    selected.exposure_score,
                    if outcome.from_cache { " (cached)" } else { "" }
                ));
            }
            Err(e) => {
                self.publish(RoutePlanningEvent::PlanFailed {
                    fingerprint: fingerprint.to_string(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.logger.error(&format!("route {} failed: {}", fingerprint, e));
            }
        }
        outcome
    }

    async fn compute(
        &self,
        region: &RegionKey,
        start: Coordinate,
        end: Coordinate,
        config: &RouteConfig,
        fingerprint: &RequestFingerprint,
    ) -> RouteResult<CachedResult> {
        let graph = self.networks.acquire(region).await?;
        let cameras = self.cameras.fetch_camera_records(region).await?;
        if cameras.is_empty() {
            tracing::warn!(%region, "no cameras known for region, every route scores zero");
            self.logger.warn(&format!("no camera records for {}", region));
        }

        let config = config.clone();
        let events = self.events.clone();
        let fp = fingerprint.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let index = CameraIndex::new(cameras);
            let input = PipelineInput { graph: &graph, cameras: &index, start, end, config: &config };
            input.run(|stage| {
                tracing::debug!(fingerprint = %fp, ?stage, "entering stage");
                if let Some(events) = &events {
                    events.publish(RoutePlanningEvent::StageEntered {
                        fingerprint: fp.to_string(),
                        stage,
                        timestamp: Utc::now(),
                    });
                }
            })
        })
        .await
        .map_err(join_error)??;

        Ok(CachedResult::new(
            fingerprint.clone(),
            region,
            outcome.selection,
            outcome.candidate_count,
        ))
    }

    fn stage_entered(&self, fingerprint: &RequestFingerprint, stage: PlanStage) {
        self.publish(RoutePlanningEvent::StageEntered {
            fingerprint: fingerprint.to_string(),
            stage,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: RoutePlanningEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
