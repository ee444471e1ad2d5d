//! Camera exposure of a route.
//!
//! A camera counts as exposure when it lies inside the corridor of width
//! `2 * buffer_radius_m` around the route polyline, i.e. within
//! `buffer_radius_m` of any point of the line. Geometry is evaluated in a local
//! equirectangular projection centred on the route, which is accurate to well
//! under a metre at walking scales.

use super::types::{Camera, Coordinate, EARTH_RADIUS_M};
use geo::{Distance, Euclidean, LineString, Point};
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use std::collections::BTreeSet;

type IndexedCamera = GeomWithData<[f64; 2], usize>;

/// Spatial index over the cameras of one request.
///
/// Built once per request and shared read-only by every candidate's scoring.
pub struct CameraIndex {
    cameras: Vec<Camera>,
    tree: RTree<IndexedCamera>,
}

impl CameraIndex {
    pub fn new(cameras: Vec<Camera>) -> Self {
        let entries = cameras
            .iter()
            .enumerate()
            .map(|(i, c)| GeomWithData::new([c.position.lon, c.position.lat], i))
            .collect();
        Self { cameras, tree: RTree::bulk_load(entries) }
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Cameras whose position lies inside `envelope` (lon/lat degrees).
    fn within(&self, envelope: AABB<[f64; 2]>) -> impl Iterator<Item = &Camera> {
        self.tree
            .locate_in_envelope(&envelope)
            .map(move |entry| &self.cameras[entry.data])
    }
}

/// Exposure of one route.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    /// Cameras per kilometre of route.
    pub score: f64,
    /// Camera points inside the corridor; records sharing an id count separately.
    pub camera_count: usize,
    pub camera_ids: BTreeSet<String>,
}

impl Exposure {
    pub fn none() -> Self {
        Self { score: 0.0, camera_count: 0, camera_ids: BTreeSet::new() }
    }
}

/// Scores a route polyline of `length_m` metres against the camera index.
///
/// A zero-length route has zero exposure and no cameras.
pub fn score(geometry: &[Coordinate], length_m: f64, index: &CameraIndex, buffer_radius_m: f64) -> Exposure {
    if length_m <= 0.0 || geometry.len() < 2 || index.is_empty() {
        return Exposure::none();
    }

    let projection = LocalProjection::centred_on(geometry);
    let line: LineString<f64> = geometry.iter().map(|c| projection.project(c)).collect();

    let mut camera_count = 0usize;
    let mut camera_ids = BTreeSet::new();
    for camera in index.within(projection.envelope(geometry, buffer_radius_m)) {
        let point: Point<f64> = projection.project(&camera.position).into();
        if Euclidean.distance(&point, &line) <= buffer_radius_m {
            camera_count += 1;
            camera_ids.insert(camera.id.clone());
        }
    }

    let score = camera_count as f64 / (length_m / 1000.0);
    tracing::debug!(cameras = camera_count, length_m, score, "scored route exposure");
    Exposure { score, camera_count, camera_ids }
}

/// Equirectangular projection to metres around a reference latitude.
struct LocalProjection {
    origin: Coordinate,
    metres_per_deg_lat: f64,
    metres_per_deg_lon: f64,
}

impl LocalProjection {
    fn centred_on(points: &[Coordinate]) -> Self {
        let n = points.len().max(1) as f64;
        let lat = points.iter().map(|c| c.lat).sum::<f64>() / n;
        let lon = points.iter().map(|c| c.lon).sum::<f64>() / n;
        let metres_per_deg_lat = EARTH_RADIUS_M.to_radians();
        Self {
            origin: Coordinate::new(lat, lon),
            metres_per_deg_lat,
            metres_per_deg_lon: metres_per_deg_lat * lat.to_radians().cos(),
        }
    }

    fn project(&self, c: &Coordinate) -> geo::Coord<f64> {
        geo::Coord {
            x: (c.lon - self.origin.lon) * self.metres_per_deg_lon,
            y: (c.lat - self.origin.lat) * self.metres_per_deg_lat,
        }
    }

    /// Bounding box of `points` grown by `margin_m`, in lon/lat degrees.
    fn envelope(&self, points: &[Coordinate], margin_m: f64) -> AABB<[f64; 2]> {
        let (mut min_lon, mut min_lat) = (f64::INFINITY, f64::INFINITY);
        let (mut max_lon, mut max_lat) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in points {
            min_lon = min_lon.min(c.lon);
            max_lon = max_lon.max(c.lon);
            min_lat = min_lat.min(c.lat);
            max_lat = max_lat.max(c.lat);
        }
        // slack absorbs projection error at the corridor edge
        let dlat = margin_m * 1.01 / self.metres_per_deg_lat;
        let dlon = margin_m * 1.01 / self.metres_per_deg_lon.max(1e-6);
        AABB::from_corners([min_lon - dlon, min_lat - dlat], [max_lon + dlon, max_lat + dlat])
    }
}
