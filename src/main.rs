use clap::{Parser, Subcommand};
use low_surveillance_routes::adapters::inbound::FileEventLog;
use low_surveillance_routes::adapters::outbound::{init_buffered_logger, init_combined_logger};
use low_surveillance_routes::application::{spawn_event_recorder, RoutePlanningService};
use low_surveillance_routes::domains::route_planning::{Coordinate, PlanEventPublisher};
use low_surveillance_routes::Config;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "low-surveillance-routes", about = "Plan walking routes that avoid surveillance cameras")]
struct Cli {
    /// Configuration file (toml); missing files fall back to defaults.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the least-surveilled route between two coordinates.
    Plan {
        #[arg(long)]
        city: String,
        #[arg(long)]
        country: Option<String>,
        /// Start as `lat,lon`.
        #[arg(long, value_parser = parse_coordinate)]
        start: Coordinate,
        /// End as `lat,lon`.
        #[arg(long, value_parser = parse_coordinate)]
        end: Coordinate,
        /// Write the route as GeoJSON here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Forget the cached street graph of a region.
    Invalidate {
        #[arg(long)]
        city: String,
        #[arg(long)]
        country: Option<String>,
    },
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got `{}`", raw))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;
    Ok(Coordinate::new(lat, lon))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(Some(&cli.config))?;
    info!(data_dir = %config.storage.data_dir.display(), "configuration loaded");

    let logger = init_buffered_logger(
        init_combined_logger(config.logging.file.as_deref()),
        config.logging.buffer_capacity,
    );
    let mut service = RoutePlanningService::from_config(&config, logger);

    let recorder = match &config.logging.event_log {
        Some(dir) => {
            let (publisher, events) = PlanEventPublisher::channel(config.logging.buffer_capacity);
            service = service.with_events(publisher);
            Some(spawn_event_recorder(events, Arc::new(FileEventLog::new(dir))))
        }
        None => None,
    };

    let result = run(&service, cli.command).await;
    // dropping the service closes the event channel so the recorder finishes
    drop(service);
    if let Some(recorder) = recorder {
        match recorder.await? {
            Ok(recorded) => info!(recorded, "planning events recorded"),
            Err(e) => error!(error = %e, "event recorder stopped"),
        }
    }
    result
}

async fn run(service: &RoutePlanningService, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Plan { city, country, start, end, out } => {
            let outcome = match service.plan(&city, country.as_deref(), start, end).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "route planning failed");
                    return Err(e.into());
                }
            };
            let route = &outcome.result;
            info!(
                fingerprint = %route.fingerprint,
                length_m = route.selected.length_m,
                exposure_score = route.selected.exposure_score,
                baseline_exposure_score = route.baseline.exposure_score,
                privacy_gain = ?route.privacy_gain,
                from_cache = outcome.from_cache,
                "route ready"
            );

            let geojson = serde_json::to_string_pretty(&route.to_feature_collection())?;
            match out {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, geojson).await?;
                    info!(path = %path.display(), "wrote route geojson");
                }
                None => println!("{}", geojson),
            }
        }
        Command::Invalidate { city, country } => {
            service.invalidate(&city, country.as_deref()).await?;
            info!(%city, "street graph invalidated");
        }
    }
    Ok(())
}
