use super::ports::ResultStore;
use super::selector::{ScoredRoute, Selection};
use super::types::{RegionKey, RequestFingerprint};
use crate::common::{RouteError, RouteResult, SingleFlight};
use chrono::{DateTime, Utc};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A completed planning computation. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub fingerprint: RequestFingerprint,
    pub region: String,
    pub selected: ScoredRoute,
    /// The pure shortest path.
    pub baseline: ScoredRoute,
    pub privacy_gain: Option<f64>,
    pub candidate_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl CachedResult {
    pub fn new(
        fingerprint: RequestFingerprint,
        region: &RegionKey,
        selection: Selection,
        candidate_count: usize,
    ) -> Self {
        let privacy_gain = selection.privacy_gain();
        Self {
            fingerprint,
            region: region.to_string(),
            selected: selection.best,
            baseline: selection.baseline,
            privacy_gain,
            candidate_count,
            computed_at: Utc::now(),
        }
    }

    /// Renders the selected route as a single-feature GeoJSON collection.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let positions: Vec<Vec<f64>> = self
            .selected
            .geometry
            .iter()
            .map(|c| vec![c.lon, c.lat])
            .collect();
        let value = match positions.as_slice() {
            [single] => Value::Point(single.clone()),
            _ => Value::LineString(positions),
        };

        let mut properties = JsonObject::new();
        properties.insert("region".to_string(), self.region.clone().into());
        properties.insert("fingerprint".to_string(), self.fingerprint.as_str().into());
        properties.insert("length_m".to_string(), self.selected.length_m.into());
        properties.insert("exposure_score".to_string(), self.selected.exposure_score.into());
        properties.insert("camera_count".to_string(), self.selected.camera_count.into());
        properties.insert("baseline_length_m".to_string(), self.baseline.length_m.into());
        properties.insert(
            "baseline_exposure_score".to_string(),
            self.baseline.exposure_score.into(),
        );
        properties.insert("privacy_gain".to_string(), self.privacy_gain.into());
        properties.insert(
            "nearby_camera_ids".to_string(),
            self.selected
                .nearby_camera_ids
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .into(),
        );
        properties.insert("candidate_count".to_string(), self.candidate_count.into());
        properties.insert("computed_at".to_string(), self.computed_at.to_rfc3339().into());

        FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(value)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }],
            foreign_members: None,
        }
    }
}

/// Result of a planning call.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub result: Arc<CachedResult>,
    /// False only for the caller whose request ran the computation.
    pub from_cache: bool,
}

/// Memoizes planning computations by request fingerprint, computing each at
/// most once at a time.
pub struct ResultCache {
    memory: RwLock<HashMap<RequestFingerprint, Arc<CachedResult>>>,
    store: Arc<dyn ResultStore>,
    flights: SingleFlight<RequestFingerprint, Arc<CachedResult>>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Stored result for `fingerprint`, if any.
    pub async fn get(&self, fingerprint: &RequestFingerprint) -> RouteResult<Option<Arc<CachedResult>>> {
        if let Some(hit) = self.memory.read().await.get(fingerprint).cloned() {
            return Ok(Some(hit));
        }
        let Some(stored) = self.store.load_result(fingerprint).await? else {
            return Ok(None);
        };
        let stored = Arc::new(stored);
        Ok(Some(self.remember(stored).await))
    }

    /// Returns the cached result for `fingerprint` or runs `compute` to
    /// produce it. Concurrent callers for the same fingerprint share one run;
    /// failures of the computation or of storing its result reach every
    /// waiter wrapped in `ComputationFailed` and are not stored.
    pub async fn get_or_compute<F, Fut>(&self, fingerprint: &RequestFingerprint, compute: F) -> RouteResult<PlanOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RouteResult<CachedResult>>,
    {
        if let Some(result) = self.get(fingerprint).await? {
            return Ok(PlanOutcome { result, from_cache: true });
        }

        let computed_here = AtomicBool::new(false);
        let result = self
            .flights
            .run(fingerprint.clone(), || async {
                if let Some(result) = self.get(fingerprint).await? {
                    return Ok(result);
                }
                computed_here.store(true, Ordering::SeqCst);
                let failed = |e: RouteError| RouteError::ComputationFailed {
                    fingerprint: fingerprint.to_string(),
                    source: Box::new(e),
                };
                let computed = compute().await.map_err(failed)?;
                let stored = self.store.insert_result(computed).await.map_err(failed)?;
                Ok(self.remember(Arc::new(stored)).await)
            })
            .await?;

        Ok(PlanOutcome { result, from_cache: !computed_here.load(Ordering::SeqCst) })
    }

    /// Keeps the first in-memory copy of a fingerprint.
    async fn remember(&self, result: Arc<CachedResult>) -> Arc<CachedResult> {
        self.memory
            .write()
            .await
            .entry(result.fingerprint.clone())
            .or_insert(result)
            .clone()
    }
}
