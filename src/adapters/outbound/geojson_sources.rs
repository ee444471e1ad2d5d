use crate::common::{RouteError, RouteResult};
use crate::domains::route_planning::graph::{RawEdge, RawNetwork, RawNode};
use crate::domains::route_planning::ports::{CameraSource, NetworkSource};
use crate::domains::route_planning::types::{Camera, Coordinate, NodeId, RegionKey};
use async_trait::async_trait;
use geojson::feature::Id;
use geojson::{Feature, GeoJson, Position, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// Reads `<slug>.geojson` extracts of walkable ways.
///
/// Every LineString (or MultiLineString part) contributes one edge per pair of
/// consecutive vertices; vertices closer than 1e-7 degrees are merged.
pub struct GeoJsonNetworkSource {
    dir: PathBuf,
}

impl GeoJsonNetworkSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, region: &RegionKey) -> PathBuf {
        self.dir.join(format!("{}.geojson", region.slug()))
    }
}

#[async_trait]
impl NetworkSource for GeoJsonNetworkSource {
    async fn fetch_walkable_network(&self, region: &RegionKey) -> RouteResult<RawNetwork> {
        let path = self.path_for(region);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RouteError::RegionNotFound { region: region.to_string() });
            }
            Err(e) => {
                return Err(RouteError::NetworkUnavailable {
                    region: region.to_string(),
                    reason: format!("reading {}: {}", path.display(), e),
                })
            }
        };
        let features = parse_features(&text).map_err(|reason| RouteError::NetworkUnavailable {
            region: region.to_string(),
            reason,
        })?;

        let network = build_network(&features);
        tracing::info!(
            %region,
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            "read walkable network from geojson"
        );
        Ok(network)
    }
}

/// Builds a raw network from line features, numbering vertices in first-seen order.
pub fn build_network(features: &[Feature]) -> RawNetwork {
    let mut builder = NetworkBuilder::default();
    for feature in features {
        match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::LineString(line)) => builder.add_line(line),
            Some(Value::MultiLineString(lines)) => lines.iter().for_each(|line| builder.add_line(line)),
            _ => {}
        }
    }
    builder.network
}

#[derive(Default)]
struct NetworkBuilder {
    ids: HashMap<(i64, i64), NodeId>,
    network: RawNetwork,
}

impl NetworkBuilder {
    fn vertex(&mut self, position: &Position) -> Option<(NodeId, Coordinate)> {
        let (lon, lat) = match position.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => return None,
        };
        let coordinate = Coordinate::new(lat, lon);
        let key = ((lat * 1e7).round() as i64, (lon * 1e7).round() as i64);
        let next_id = self.ids.len() as NodeId;
        let id = *self.ids.entry(key).or_insert_with(|| {
            self.network.nodes.push(RawNode { id: next_id, lat, lon });
            next_id
        });
        Some((id, coordinate))
    }

    fn add_line(&mut self, line: &[Position]) {
        let mut previous: Option<(NodeId, Coordinate)> = None;
        for position in line {
            let Some(current) = self.vertex(position) else {
                continue;
            };
            if let Some((prev_id, prev_coord)) = previous {
                if prev_id != current.0 {
                    self.network.edges.push(RawEdge {
                        source: prev_id,
                        target: current.0,
                        length_m: Some(prev_coord.haversine_m(&current.1)),
                        geometry: None,
                    });
                }
            }
            previous = Some(current);
        }
    }
}

/// Reads `<slug>.geojson` point layers of camera positions.
pub struct GeoJsonCameraSource {
    dir: PathBuf,
}

impl GeoJsonCameraSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, region: &RegionKey) -> PathBuf {
        self.dir.join(format!("{}.geojson", region.slug()))
    }
}

#[async_trait]
impl CameraSource for GeoJsonCameraSource {
    async fn fetch_camera_records(&self, region: &RegionKey) -> RouteResult<Vec<Camera>> {
        let path = self.path_for(region);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(%region, path = %path.display(), "no camera file for region");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let features = parse_features(&text).map_err(RouteError::Serialization)?;
        let cameras = cameras_from_features(&features);
        tracing::info!(%region, cameras = cameras.len(), "loaded camera records");
        Ok(cameras)
    }
}

/// Point features as cameras; ids come from the feature id, then
/// `properties.id`, then `camera-<feature index>`.
pub fn cameras_from_features(features: &[Feature]) -> Vec<Camera> {
    features
        .iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let Some(Value::Point(point)) = feature.geometry.as_ref().map(|g| &g.value) else {
                return None;
            };
            let [lon, lat, ..] = point.as_slice() else {
                return None;
            };
            let id = match &feature.id {
                Some(Id::String(s)) => s.clone(),
                Some(Id::Number(n)) => n.to_string(),
                None => match feature.property("id") {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    _ => format!("camera-{}", index),
                },
            };
            Some(Camera::new(id, *lat, *lon))
        })
        .collect()
}

fn parse_features(text: &str) -> Result<Vec<Feature>, String> {
    match text.parse::<GeoJson>().map_err(|e| e.to_string())? {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err("expected a Feature or FeatureCollection".to_string()),
    }
}
