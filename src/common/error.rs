use thiserror::Error;

/// Failures surfaced by the route planning engine.
///
/// Every variant carries enough detail to render a precise message. The enum
/// is `Clone` so a single failure can be handed to every caller waiting on
/// the same in-flight computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Region not found: {region}")]
    RegionNotFound { region: String },

    #[error("Street network unavailable for {region}: {reason}")]
    NetworkUnavailable { region: String, reason: String },

    #[error("Nearest walkable node is {distance_m:.1}m away (threshold: {threshold_m}m)")]
    SnapOutOfRange { distance_m: f64, threshold_m: f64 },

    #[error("No walkable path exists between nodes {start} and {end}")]
    NoPathFound { start: u64, end: u64 },

    #[error("No candidate routes to select from")]
    NoCandidates,

    #[error("Computation failed for request {fingerprint}: {source}")]
    ComputationFailed {
        fingerprint: String,
        #[source]
        source: Box<RouteError>,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Computation was cancelled")]
    Cancelled,
}

impl RouteError {
    /// Unwraps cache-layer wrapping and returns the failure that caused it.
    pub fn root_cause(&self) -> &RouteError {
        match self {
            RouteError::ComputationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Transient failures may succeed when the whole request is retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root_cause(),
            RouteError::NetworkUnavailable { .. } | RouteError::Storage(_) | RouteError::Cancelled
        )
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(e: serde_json::Error) -> Self {
        RouteError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for RouteError {
    fn from(e: bincode::Error) -> Self {
        RouteError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for RouteError {
    fn from(e: std::io::Error) -> Self {
        RouteError::Storage(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Route planning error: {0}")]
    Route(#[from] RouteError),

    #[error("Event log error: {0}")]
    EventLog(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type RouteResult<T> = Result<T, RouteError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
