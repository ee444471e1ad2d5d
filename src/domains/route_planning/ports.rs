use super::graph::{RawNetwork, StreetGraph};
use super::result_cache::CachedResult;
use super::types::{Camera, RegionKey, RequestFingerprint};
use crate::common::RouteResult;
use async_trait::async_trait;

/// Port for acquiring the raw walkable network of a region (OSM extracts,
/// Overpass, local files, ...).
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Fails with `RegionNotFound` when the region has no geographic extent
    /// and `NetworkUnavailable` when the data cannot be fetched.
    async fn fetch_walkable_network(&self, region: &RegionKey) -> RouteResult<RawNetwork>;
}

/// Port for the camera records of a region.
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn fetch_camera_records(&self, region: &RegionKey) -> RouteResult<Vec<Camera>>;
}

/// Durable storage for street graphs, keyed by storage name.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `name`.
    async fn load_graph(&self, name: &str) -> RouteResult<Option<StreetGraph>>;
    /// Stores atomically: an interrupted save leaves no entry behind.
    async fn save_graph(&self, name: &str, region: &RegionKey, graph: &StreetGraph) -> RouteResult<()>;
    async fn delete_graph(&self, name: &str) -> RouteResult<()>;
}

/// Durable storage for computed results, keyed by request fingerprint.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn load_result(&self, fingerprint: &RequestFingerprint) -> RouteResult<Option<CachedResult>>;
    /// Inserts unless an entry exists; returns the entry that is stored
    /// afterwards, which is the earlier one when the fingerprint was taken.
    async fn insert_result(&self, result: CachedResult) -> RouteResult<CachedResult>;
}
