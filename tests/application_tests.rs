use low_surveillance_routes::adapters::inbound::FileEventLog;
use low_surveillance_routes::adapters::outbound::init_noop_logger;
use low_surveillance_routes::application::{spawn_event_recorder, RoutePlanningService, AGGREGATE_TYPE};
use low_surveillance_routes::domains::route_planning::{Coordinate, PlanEventPublisher, RegionKey, RequestFingerprint};
use low_surveillance_routes::{ApplicationError, Config, EventLog, RouteError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// A 3x2 street grid in Ghent with a camera on the northern street.
fn seed_data_dir(data_dir: &Path) {
    fs::create_dir_all(data_dir.join("geojson")).unwrap();
    fs::create_dir_all(data_dir.join("cameras")).unwrap();
    fs::write(
        data_dir.join("geojson/ghent_be.geojson"),
        r#"{"type":"FeatureCollection","features":[
  {"type":"Feature","properties":{"name":"north"},"geometry":{"type":"LineString","coordinates":[[3.720,51.052],[3.722,51.052],[3.724,51.052]]}},
  {"type":"Feature","properties":{"name":"south"},"geometry":{"type":"LineString","coordinates":[[3.720,51.050],[3.722,51.050],[3.724,51.050]]}},
  {"type":"Feature","properties":{"name":"west"},"geometry":{"type":"LineString","coordinates":[[3.720,51.050],[3.720,51.052]]}},
  {"type":"Feature","properties":{"name":"east"},"geometry":{"type":"LineString","coordinates":[[3.724,51.050],[3.724,51.052]]}}
]}"#,
    )
    .unwrap();
    fs::write(
        data_dir.join("cameras/ghent_be.geojson"),
        r#"{"type":"FeatureCollection","features":[
  {"type":"Feature","id":"belfry-1","properties":{},"geometry":{"type":"Point","coordinates":[3.722,51.0521]}}
]}"#,
    )
    .unwrap();
}

fn config_for(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.routing.candidate_count = 3;
    config
}

#[tokio::test]
async fn service_plans_around_the_camera_using_local_files() {
    let dir = tempdir().unwrap();
    seed_data_dir(dir.path());
    let service = RoutePlanningService::from_config(&config_for(dir.path()), init_noop_logger());

    // north-west corner to north-east corner
    let start = Coordinate::new(51.052, 3.720);
    let end = Coordinate::new(51.052, 3.724);
    let outcome = service.plan("Ghent", Some("BE"), start, end).await.unwrap();
    let result = &outcome.result;

    assert_eq!(result.region, "ghent, be");
    assert!(result.baseline.nearby_camera_ids.contains("belfry-1"));
    assert!(result.selected.nearby_camera_ids.is_empty());
    assert_eq!(result.selected.exposure_score, 0.0);
    assert!(result.selected.length_m > result.baseline.length_m);
    assert_eq!(result.privacy_gain, Some(1.0));

    let storage = &config_for(dir.path()).storage;
    assert_eq!(fs::read_dir(storage.graphs_dir()).unwrap().count(), 1);
    let stored = storage.results_dir().join(format!("{}.json", result.fingerprint));
    assert!(stored.exists());

    let geojson = serde_json::to_value(result.to_feature_collection()).unwrap();
    assert_eq!(geojson["type"], "FeatureCollection");
    assert_eq!(geojson["features"][0]["geometry"]["type"], "LineString");
    assert_eq!(geojson["features"][0]["properties"]["privacy_gain"], 1.0);
}

#[tokio::test]
async fn invalidate_removes_the_stored_graph() {
    let dir = tempdir().unwrap();
    seed_data_dir(dir.path());
    let config = config_for(dir.path());
    let service = RoutePlanningService::from_config(&config, init_noop_logger());

    service
        .plan("Ghent", Some("be"), Coordinate::new(51.050, 3.720), Coordinate::new(51.050, 3.724))
        .await
        .unwrap();
    assert_eq!(fs::read_dir(config.storage.graphs_dir()).unwrap().count(), 1);

    service.invalidate("ghent", Some("BE")).await.unwrap();
    assert_eq!(fs::read_dir(config.storage.graphs_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_region_is_reported() {
    let dir = tempdir().unwrap();
    let service = RoutePlanningService::from_config(&config_for(dir.path()), init_noop_logger());

    let err = service
        .plan("Nowhere", None, Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.001))
        .await
        .unwrap_err();
    match err {
        ApplicationError::Route(e) => {
            assert!(matches!(e.root_cause(), RouteError::RegionNotFound { .. }))
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn planning_events_are_recorded_per_fingerprint() {
    let dir = tempdir().unwrap();
    seed_data_dir(dir.path());
    let config = config_for(dir.path());
    let (publisher, events) = PlanEventPublisher::channel(64);
    let log = Arc::new(FileEventLog::new(dir.path().join("events")));
    let recorder = spawn_event_recorder(events, log.clone());

    let service = RoutePlanningService::from_config(&config, init_noop_logger()).with_events(publisher);
    let start = Coordinate::new(51.050, 3.720);
    let end = Coordinate::new(51.052, 3.724);
    service.plan("Ghent", Some("BE"), start, end).await.unwrap();
    service.plan("Ghent", Some("BE"), start, end).await.unwrap();
    drop(service);

    let recorded = recorder.await.unwrap().unwrap();
    let region = RegionKey::new("Ghent", Some("BE")).unwrap();
    let fingerprint = RequestFingerprint::compute(
        &region,
        &config.routing.network_type,
        &start,
        &end,
        &config.route_config(),
    );
    let envelopes = log.load(fingerprint.as_str()).await.unwrap();

    assert_eq!(envelopes.len(), recorded);
    assert!(envelopes.iter().all(|e| e.aggregate_type == AGGREGATE_TYPE));
    let types: Vec<_> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first(), Some(&"PlanRequested"));
    assert_eq!(types.iter().filter(|t| **t == "PlanCompleted").count(), 2);
    assert_eq!(types.iter().filter(|t| **t == "StageEntered").count(), 5);
    assert_eq!(envelopes.last().unwrap().event_data["PlanCompleted"]["from_cache"], true);
}
