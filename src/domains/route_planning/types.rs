use crate::common::{RouteError, RouteResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a street-network node.
pub type NodeId = u64;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in metres.
    pub fn haversine_m(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Coordinate rounded to micro-degrees, used for fingerprinting.
    pub fn micro_degrees(&self) -> (i64, i64) {
        ((self.lat * 1e6).round() as i64, (self.lon * 1e6).round() as i64)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A surveillance camera position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub position: Coordinate,
}

impl Camera {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self { id: id.into(), position: Coordinate::new(lat, lon) }
    }
}

/// Canonical identifier of a geographic area whose walkable graph is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    city: String,
    country: Option<String>,
}

impl RegionKey {
    pub fn new(city: &str, country: Option<&str>) -> RouteResult<Self> {
        let city = canonical(city);
        if city.is_empty() {
            return Err(RouteError::RegionNotFound { region: String::new() });
        }
        let country = country.map(canonical).filter(|c| !c.is_empty());
        Ok(Self { city, country })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Filesystem-friendly name, e.g. `new_york_us`.
    pub fn slug(&self) -> String {
        let mut slug = self.city.replace(' ', "_");
        if let Some(country) = &self.country {
            slug.push('_');
            slug.push_str(&country.replace(' ', "_"));
        }
        slug
    }

    /// Digest naming the persisted graph for this region and network type.
    pub fn storage_name(&self, network_type: &str) -> String {
        let input = format!(
            "{}|{}|{}",
            self.city,
            self.country.as_deref().unwrap_or(""),
            network_type
        );
        format!("{:x}", md5::compute(input.as_bytes()))
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(country) => write!(f, "{}, {}", self.city, country),
            None => write!(f, "{}", self.city),
        }
    }
}

fn canonical(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scoring configuration of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub candidate_count: usize,
    pub buffer_radius_m: f64,
    pub snap_threshold_m: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { candidate_count: 5, buffer_radius_m: 50.0, snap_threshold_m: 500.0 }
    }
}

impl RouteConfig {
    pub fn validate(&self) -> RouteResult<()> {
        if self.candidate_count < 1 {
            return Err(RouteError::InvalidConfig {
                reason: "candidate_count must be at least 1".to_string(),
            });
        }
        if !(self.buffer_radius_m.is_finite() && self.buffer_radius_m > 0.0) {
            return Err(RouteError::InvalidConfig {
                reason: format!("buffer_radius_m must be positive, got {}", self.buffer_radius_m),
            });
        }
        if !(self.snap_threshold_m.is_finite() && self.snap_threshold_m > 0.0) {
            return Err(RouteError::InvalidConfig {
                reason: format!("snap_threshold_m must be positive, got {}", self.snap_threshold_m),
            });
        }
        Ok(())
    }
}

/// Deterministic identity of a planning request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Coordinates are rounded to 6 decimals and distances to millimetres, so
    /// jitter below that precision maps to the same fingerprint. The network
    /// type is part of the identity: a walk and a bike graph of one region
    /// produce different routes.
    pub fn compute(
        region: &RegionKey,
        network_type: &str,
        start: &Coordinate,
        end: &Coordinate,
        config: &RouteConfig,
    ) -> Self {
        let (start_lat, start_lon) = start.micro_degrees();
        let (end_lat, end_lon) = end.micro_degrees();
        let canonical = format!(
            "{}|{}|{}|{},{}|{},{}|k={}|buf={}|snap={}",
            region.city(),
            region.country().unwrap_or(""),
            network_type,
            start_lat,
            start_lon,
            end_lat,
            end_lon,
            config.candidate_count,
            (config.buffer_radius_m * 1000.0).round() as i64,
            (config.snap_threshold_m * 1000.0).round() as i64,
        );
        Self(format!("{:x}", md5::compute(canonical.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
