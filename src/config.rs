use crate::domains::route_planning::types::RouteConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DATA_DIR_ENV: &str = "ROUTE_PLANNING_DATA_DIR";
pub const ENV_PREFIX: &str = "LSR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub candidate_count: usize,
    pub buffer_radius_m: f64,
    pub snap_threshold_m: f64,
    pub network_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
    pub buffer_capacity: usize,
    pub event_log: Option<PathBuf>,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, overlaid by `path` when it exists, overlaid by `LSR__*`
    /// environment variables (e.g. `LSR__ROUTING__CANDIDATE_COUNT=8`).
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn route_config(&self) -> RouteConfig {
        RouteConfig {
            candidate_count: self.routing.candidate_count,
            buffer_radius_m: self.routing.buffer_radius_m,
            snap_threshold_m: self.routing.snap_threshold_m,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}

impl StorageConfig {
    pub fn graphs_dir(&self) -> PathBuf {
        self.data_dir.join("graphs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn geojson_dir(&self) -> PathBuf {
        self.data_dir.join("geojson")
    }

    pub fn cameras_dir(&self) -> PathBuf {
        self.data_dir.join("cameras")
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let route = RouteConfig::default();
        Self {
            candidate_count: route.candidate_count,
            buffer_radius_m: route.buffer_radius_m,
            snap_threshold_m: route.snap_threshold_m,
            network_type: "walk".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("resources/route_planning"));
        Self { data_dir }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { file: None, buffer_capacity: 256, event_log: None }
    }
}
