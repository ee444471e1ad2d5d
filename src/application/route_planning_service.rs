use crate::adapters::outbound::{FileResultStore, FilesystemGraphStore, GeoJsonCameraSource, GeoJsonNetworkSource};
use crate::common::{ApplicationError, ApplicationResult, DomainEvent, EventEnvelope, EventLog, EventMetadata};
use crate::config::Config;
use crate::domains::logger::DynLogger;
use crate::domains::route_planning::{
    Coordinate, NetworkStore, PlanEventPublisher, PlanOutcome, RegionKey, ResultCache, RoutePlanner,
    RoutePlanningEvent, RouteConfig,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const AGGREGATE_TYPE: &str = "RouteRequest";

/// Application facade: resolves regions and configuration, then delegates to
/// the planning engine.
pub struct RoutePlanningService {
    planner: RoutePlanner,
    route_config: RouteConfig,
}

impl RoutePlanningService {
    pub fn new(planner: RoutePlanner, route_config: RouteConfig) -> Self {
        Self { planner, route_config }
    }

    /// Wires the filesystem adapters under `config.storage.data_dir`.
    pub fn from_config(config: &Config, logger: DynLogger) -> Self {
        let storage = &config.storage;
        let networks = Arc::new(NetworkStore::new(
            Arc::new(FilesystemGraphStore::new(storage.graphs_dir())),
            Arc::new(GeoJsonNetworkSource::new(storage.geojson_dir())),
            config.routing.network_type.clone(),
            config.fetch_timeout(),
        ));
        let results = Arc::new(ResultCache::new(Arc::new(FileResultStore::new(storage.results_dir()))));
        let cameras = Arc::new(GeoJsonCameraSource::new(storage.cameras_dir()));
        Self::new(RoutePlanner::new(networks, cameras, results, logger), config.route_config())
    }

    pub fn with_events(mut self, publisher: PlanEventPublisher) -> Self {
        self.planner = self.planner.with_events(publisher);
        self
    }

    pub fn route_config(&self) -> &RouteConfig {
        &self.route_config
    }

    pub async fn plan(
        &self,
        city: &str,
        country: Option<&str>,
        start: Coordinate,
        end: Coordinate,
    ) -> ApplicationResult<PlanOutcome> {
        let region = RegionKey::new(city, country)?;
        Ok(self
            .planner
            .plan_route(&region, start, end, &self.route_config)
            .await?)
    }

    /// Drops the cached street graph of a region so the next plan refetches it.
    pub async fn invalidate(&self, city: &str, country: Option<&str>) -> ApplicationResult<()> {
        let region = RegionKey::new(city, country)?;
        self.planner.networks().invalidate(&region).await?;
        Ok(())
    }
}

/// Drains planning events into `log` until every publisher is dropped.
pub fn spawn_event_recorder(
    mut events: mpsc::Receiver<RoutePlanningEvent>,
    log: Arc<dyn EventLog>,
) -> JoinHandle<ApplicationResult<usize>> {
    tokio::spawn(async move {
        let mut recorded = 0usize;
        while let Some(event) = events.recv().await {
            let metadata = EventMetadata { correlation_id: None, source: "route-planner".to_string() };
            let envelope = EventEnvelope::new(&event, AGGREGATE_TYPE, metadata)
                .map_err(|e| ApplicationError::EventLog(e.to_string()))?;
            if let Err(e) = log.append(envelope).await {
                tracing::warn!(event_type = event.event_type(), error = %e, "failed to record planning event");
                continue;
            }
            recorded += 1;
        }
        Ok(recorded)
    })
}
