use super::graph::StreetGraph;
use super::ports::{GraphStore, NetworkSource};
use super::types::RegionKey;
use crate::common::{join_error, RouteError, RouteResult, SingleFlight};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Owns the street graph of every region acquired so far.
///
/// Lookups go memory, then durable store, then the network source. A miss for
/// one region issues exactly one fetch no matter how many callers are waiting
/// on it; graphs are handed out as shared read-only references.
pub struct NetworkStore {
    graphs: RwLock<HashMap<RegionKey, Arc<StreetGraph>>>,
    store: Arc<dyn GraphStore>,
    source: Arc<dyn NetworkSource>,
    network_type: String,
    fetch_timeout: Duration,
    flights: SingleFlight<RegionKey, Arc<StreetGraph>>,
}

impl NetworkStore {
    pub fn new(
        store: Arc<dyn GraphStore>,
        source: Arc<dyn NetworkSource>,
        network_type: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            store,
            source,
            network_type: network_type.into(),
            fetch_timeout,
            flights: SingleFlight::new(),
        }
    }

    pub fn network_type(&self) -> &str {
        &self.network_type
    }

    /// Returns the graph of `region`, building and persisting it on a miss.
    pub async fn acquire(&self, region: &RegionKey) -> RouteResult<Arc<StreetGraph>> {
        if let Some(graph) = self.cached(region).await {
            return Ok(graph);
        }
        self.flights
            .run(region.clone(), || self.load_or_fetch(region))
            .await
    }

    /// Forgets the graph of `region` in memory and in durable storage.
    pub async fn invalidate(&self, region: &RegionKey) -> RouteResult<()> {
        self.graphs.write().await.remove(region);
        self.store
            .delete_graph(&region.storage_name(&self.network_type))
            .await?;
        tracing::info!(%region, "invalidated street graph");
        Ok(())
    }

    async fn cached(&self, region: &RegionKey) -> Option<Arc<StreetGraph>> {
        self.graphs.read().await.get(region).cloned()
    }

    async fn load_or_fetch(&self, region: &RegionKey) -> RouteResult<Arc<StreetGraph>> {
        // a previous leader may have finished between our miss and our turn
        if let Some(graph) = self.cached(region).await {
            return Ok(graph);
        }

        let name = region.storage_name(&self.network_type);
        let graph = match self.store.load_graph(&name).await {
            Ok(Some(graph)) => {
                tracing::info!(%region, nodes = graph.node_count(), "loaded street graph from store");
                graph
            }
            Ok(None) => self.fetch_and_persist(region, &name).await?,
            Err(RouteError::Serialization(reason)) => {
                tracing::warn!(%region, %reason, "stored street graph unreadable, refetching");
                self.fetch_and_persist(region, &name).await?
            }
            Err(e) => return Err(e),
        };

        let graph = Arc::new(graph);
        self.graphs
            .write()
            .await
            .insert(region.clone(), graph.clone());
        Ok(graph)
    }

    async fn fetch_and_persist(&self, region: &RegionKey, name: &str) -> RouteResult<StreetGraph> {
        tracing::info!(%region, network_type = %self.network_type, "fetching street network");
        let raw = tokio::time::timeout(self.fetch_timeout, self.source.fetch_walkable_network(region))
            .await
            .map_err(|_| RouteError::NetworkUnavailable {
                region: region.to_string(),
                reason: format!("fetch timed out after {:?}", self.fetch_timeout),
            })?
            .map_err(|e| match e {
                RouteError::RegionNotFound { .. } | RouteError::NetworkUnavailable { .. } => e,
                other => RouteError::NetworkUnavailable {
                    region: region.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let label = region.to_string();
        let graph = tokio::task::spawn_blocking(move || StreetGraph::from_raw(&label, raw))
            .await
            .map_err(join_error)??;

        self.store.save_graph(name, region, &graph).await?;
        tracing::info!(
            %region,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "persisted street graph"
        );
        Ok(graph)
    }
}
