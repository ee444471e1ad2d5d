use async_trait::async_trait;
use low_surveillance_routes::adapters::outbound::{
    init_noop_logger, FileResultStore, FilesystemGraphStore, InMemoryResultStore,
};
use low_surveillance_routes::domains::route_planning::{
    Camera, CameraSource, Coordinate, GraphStore, NetworkSource, NetworkStore, PlanEventPublisher, PlanStage,
    RawEdge, RawNetwork, RawNode, RegionKey, ResultCache, ResultStore, RouteConfig, RoutePlanner,
    RoutePlanningEvent,
};
use low_surveillance_routes::{RouteError, RouteResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const M_PER_DEG: f64 = 111_194.93;

struct FakeNetwork {
    raw: RawNetwork,
    fetches: AtomicUsize,
    hang: AtomicBool,
}

impl FakeNetwork {
    fn new(raw: RawNetwork) -> Arc<Self> {
        Arc::new(Self { raw, fetches: AtomicUsize::new(0), hang: AtomicBool::new(false) })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkSource for FakeNetwork {
    async fn fetch_walkable_network(&self, _: &RegionKey) -> RouteResult<RawNetwork> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(self.raw.clone())
    }
}

struct FakeCameras {
    cameras: Vec<Camera>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl FakeCameras {
    fn new(cameras: Vec<Camera>) -> Arc<Self> {
        Self::slow(cameras, Duration::ZERO)
    }

    fn slow(cameras: Vec<Camera>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { cameras, fetches: AtomicUsize::new(0), delay })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraSource for FakeCameras {
    async fn fetch_camera_records(&self, _: &RegionKey) -> RouteResult<Vec<Camera>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.cameras.clone())
    }
}

fn metres(m: f64) -> f64 {
    m / M_PER_DEG
}

fn node(id: u64, lat: f64, lon: f64) -> RawNode {
    RawNode { id, lat, lon }
}

fn edge(source: u64, target: u64, length_m: f64) -> RawEdge {
    RawEdge { source, target, length_m: Some(length_m), geometry: None }
}

/// Nodes 0..5 along the equator, 100m apart.
fn line_network() -> RawNetwork {
    RawNetwork {
        nodes: (0..5).map(|i| node(i, 0.0, metres(100.0 * i as f64))).collect(),
        edges: (1..5).map(|i| edge(i - 1, i, 100.0)).collect(),
    }
}

/// Start 0 and end 3 joined by a northern route via 1 and a southern route via 2.
fn parallel_network() -> RawNetwork {
    RawNetwork {
        nodes: vec![
            node(0, 0.0, 0.0),
            node(1, 0.002, 0.0045),
            node(2, -0.002, 0.0045),
            node(3, 0.0, 0.009),
        ],
        edges: vec![edge(0, 1, 500.0), edge(1, 3, 500.0), edge(0, 2, 500.0), edge(2, 3, 500.0)],
    }
}

fn northern_cameras() -> Vec<Camera> {
    vec![
        Camera::new("c1", 0.001, 0.00225),
        Camera::new("c2", 0.002 + metres(10.0), 0.0045),
        Camera::new("c3", 0.001, 0.00675),
    ]
}

fn planner_with(
    network: Arc<FakeNetwork>,
    cameras: Arc<FakeCameras>,
    graphs: Arc<dyn GraphStore>,
    results: Arc<dyn ResultStore>,
    fetch_timeout: Duration,
) -> RoutePlanner {
    let networks = Arc::new(NetworkStore::new(graphs, network, "walk", fetch_timeout));
    RoutePlanner::new(networks, cameras, Arc::new(ResultCache::new(results)), init_noop_logger())
}

fn planner(network: Arc<FakeNetwork>, cameras: Arc<FakeCameras>, data: &Path) -> RoutePlanner {
    planner_with(
        network,
        cameras,
        Arc::new(FilesystemGraphStore::new(data.join("graphs"))),
        Arc::new(FileResultStore::new(data.join("results"))),
        Duration::from_secs(5),
    )
}

fn region() -> RegionKey {
    RegionKey::new("Testville", Some("xx")).unwrap()
}

fn config(candidate_count: usize) -> RouteConfig {
    RouteConfig { candidate_count, buffer_radius_m: 50.0, snap_threshold_m: 500.0 }
}

fn graph_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn line_graph_has_one_candidate_scored_per_kilometre() {
    let dir = tempdir().unwrap();
    let cameras = FakeCameras::new(vec![Camera::new("cam-2", metres(10.0), metres(200.0))]);
    let planner = planner(FakeNetwork::new(line_network()), cameras, dir.path());

    let outcome = planner
        .plan_route(&region(), Coordinate::new(0.0, 0.0), Coordinate::new(0.0, metres(400.0)), &config(2))
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.candidate_count, 1);
    assert_eq!(result.selected.node_ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(result.selected.length_m, 400.0);
    assert!((result.selected.exposure_score - 2.5).abs() < 1e-9);
    assert_eq!(result.selected, result.baseline);
    assert_eq!(result.privacy_gain, Some(0.0));
    assert!(!outcome.from_cache);
}

#[tokio::test]
async fn parallel_routes_prefer_the_camera_free_one() {
    let dir = tempdir().unwrap();
    let planner = planner(
        FakeNetwork::new(parallel_network()),
        FakeCameras::new(northern_cameras()),
        dir.path(),
    );

    let outcome = planner
        .plan_route(&region(), Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.009), &config(2))
        .await
        .unwrap();

    let result = &outcome.result;
    assert_eq!(result.baseline.node_ids, vec![0, 1, 3]);
    assert_eq!(result.baseline.camera_count, 3);
    assert!((result.baseline.exposure_score - 3.0).abs() < 1e-9);
    assert_eq!(result.selected.node_ids, vec![0, 2, 3]);
    assert_eq!(result.selected.exposure_score, 0.0);
    assert!(result.selected.nearby_camera_ids.is_empty());
    assert_eq!(result.privacy_gain, Some(1.0));
}

#[tokio::test]
async fn concurrent_identical_requests_compute_once() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(parallel_network());
    let cameras = FakeCameras::slow(northern_cameras(), Duration::from_millis(100));
    let planner = Arc::new(planner(network.clone(), cameras.clone(), dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let planner = planner.clone();
            tokio::spawn(async move {
                planner
                    .plan_route(&region(), Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.009), &config(3))
                    .await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(cameras.fetches(), 1);
    assert_eq!(network.fetches(), 1);
    assert_eq!(outcomes.iter().filter(|o| !o.from_cache).count(), 1);
    for outcome in &outcomes {
        assert!(Arc::ptr_eq(&outcome.result, &outcomes[0].result));
    }
}

#[tokio::test]
async fn repeated_requests_return_identical_results_across_restarts() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(parallel_network());
    let cameras = FakeCameras::new(northern_cameras());
    let start = Coordinate::new(0.0, 0.0);
    let end = Coordinate::new(0.0, 0.009);

    let first_planner = planner(network.clone(), cameras.clone(), dir.path());
    let first = first_planner.plan_route(&region(), start, end, &config(2)).await.unwrap();
    // jitter below the fingerprint precision
    let again = first_planner
        .plan_route(&region(), Coordinate::new(0.000_000_1, 0.0), end, &config(2))
        .await
        .unwrap();
    assert!(again.from_cache);
    assert!(Arc::ptr_eq(&first.result, &again.result));

    let restarted = planner(network.clone(), cameras.clone(), dir.path());
    let reloaded = restarted.plan_route(&region(), start, end, &config(2)).await.unwrap();
    assert!(reloaded.from_cache);
    assert_eq!(*reloaded.result, *first.result);
    assert_eq!(cameras.fetches(), 1);
    assert_eq!(network.fetches(), 1);
}

#[tokio::test]
async fn results_are_not_shared_across_network_types() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(parallel_network());
    let cameras = FakeCameras::new(northern_cameras());
    let results: Arc<dyn ResultStore> = Arc::new(FileResultStore::new(dir.path().join("results")));
    let planner_for = |network_type: &str| {
        let networks = Arc::new(NetworkStore::new(
            Arc::new(FilesystemGraphStore::new(dir.path().join("graphs"))),
            network.clone(),
            network_type,
            Duration::from_secs(5),
        ));
        RoutePlanner::new(networks, cameras.clone(), Arc::new(ResultCache::new(results.clone())), init_noop_logger())
    };
    let start = Coordinate::new(0.0, 0.0);
    let end = Coordinate::new(0.0, 0.009);

    let walk = planner_for("walk").plan_route(&region(), start, end, &config(2)).await.unwrap();
    let bike = planner_for("bike").plan_route(&region(), start, end, &config(2)).await.unwrap();

    assert!(!walk.from_cache);
    assert!(!bike.from_cache);
    assert_ne!(walk.result.fingerprint, bike.result.fingerprint);
    assert_eq!(network.fetches(), 2);
    assert_eq!(graph_files(&dir.path().join("graphs")), 2);
    assert_eq!(graph_files(&dir.path().join("results")), 2);
}

#[tokio::test]
async fn far_away_coordinates_fail_to_snap() {
    let dir = tempdir().unwrap();
    let cameras = FakeCameras::new(vec![]);
    let planner = planner(FakeNetwork::new(line_network()), cameras.clone(), dir.path());

    let err = planner
        .plan_route(&region(), Coordinate::new(0.01, 0.0), Coordinate::new(0.0, 0.0), &config(2))
        .await
        .unwrap_err();

    match err.root_cause() {
        RouteError::SnapOutOfRange { distance_m, threshold_m } => {
            assert!(*distance_m > 1000.0);
            assert_eq!(*threshold_m, 500.0);
        }
        other => panic!("expected snapping failure, got {:?}", other),
    }
    assert!(!err.is_transient());

    // failures are not cached: the same request recomputes
    let _ = planner
        .plan_route(&region(), Coordinate::new(0.01, 0.0), Coordinate::new(0.0, 0.0), &config(2))
        .await;
    assert_eq!(cameras.fetches(), 2);
}

#[tokio::test]
async fn disconnected_endpoints_report_no_path() {
    let dir = tempdir().unwrap();
    let mut raw = line_network();
    raw.edges.retain(|e| e.source != 2);
    let planner = planner(FakeNetwork::new(raw), FakeCameras::new(vec![]), dir.path());

    let err = planner
        .plan_route(&region(), Coordinate::new(0.0, 0.0), Coordinate::new(0.0, metres(400.0)), &config(2))
        .await
        .unwrap_err();
    assert_eq!(err.root_cause(), &RouteError::NoPathFound { start: 0, end: 4 });
}

#[tokio::test]
async fn timed_out_fetch_leaves_no_graph_and_is_retried() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(line_network());
    network.hang.store(true, Ordering::SeqCst);
    let planner = planner_with(
        network.clone(),
        FakeCameras::new(vec![]),
        Arc::new(FilesystemGraphStore::new(dir.path().join("graphs"))),
        Arc::new(InMemoryResultStore::new()),
        Duration::from_millis(50),
    );
    let (start, end) = (Coordinate::new(0.0, 0.0), Coordinate::new(0.0, metres(400.0)));

    let err = planner.plan_route(&region(), start, end, &config(1)).await.unwrap_err();
    assert!(matches!(err.root_cause(), RouteError::NetworkUnavailable { .. }));
    assert!(err.is_transient());
    assert_eq!(graph_files(&dir.path().join("graphs")), 0);

    network.hang.store(false, Ordering::SeqCst);
    planner.plan_route(&region(), start, end, &config(1)).await.unwrap();
    assert_eq!(network.fetches(), 2);
    assert_eq!(graph_files(&dir.path().join("graphs")), 1);
}

#[tokio::test]
async fn aborted_request_leaves_no_graph_and_next_caller_proceeds() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(line_network());
    network.hang.store(true, Ordering::SeqCst);
    let planner = Arc::new(planner(network.clone(), FakeCameras::new(vec![]), dir.path()));
    let (start, end) = (Coordinate::new(0.0, 0.0), Coordinate::new(0.0, metres(400.0)));

    let stuck = {
        let planner = planner.clone();
        tokio::spawn(async move { planner.plan_route(&region(), start, end, &config(1)).await })
    };
    while network.fetches() == 0 {
        tokio::task::yield_now().await;
    }
    stuck.abort();
    assert!(stuck.await.unwrap_err().is_cancelled());
    assert_eq!(graph_files(&dir.path().join("graphs")), 0);

    network.hang.store(false, Ordering::SeqCst);
    let outcome = planner.plan_route(&region(), start, end, &config(1)).await.unwrap();
    assert!(!outcome.from_cache);
    assert_eq!(network.fetches(), 2);
}

#[tokio::test]
async fn planning_publishes_stage_events_in_order() {
    let dir = tempdir().unwrap();
    let (publisher, mut events) = PlanEventPublisher::channel(32);
    let planner = planner(FakeNetwork::new(line_network()), FakeCameras::new(vec![]), dir.path())
        .with_events(publisher);

    planner
        .plan_route(&region(), Coordinate::new(0.0, 0.0), Coordinate::new(0.0, metres(400.0)), &config(1))
        .await
        .unwrap();
    drop(planner);

    let mut stages = Vec::new();
    let mut completed = None;
    while let Some(event) = events.recv().await {
        match event {
            RoutePlanningEvent::StageEntered { stage, .. } => stages.push(stage),
            RoutePlanningEvent::PlanCompleted { from_cache, exposure_score, .. } => {
                completed = Some((from_cache, exposure_score))
            }
            RoutePlanningEvent::PlanRequested { .. } => assert!(stages.is_empty()),
            RoutePlanningEvent::PlanFailed { reason, .. } => panic!("unexpected failure: {}", reason),
        }
    }
    assert_eq!(
        stages,
        vec![
            PlanStage::Snapping,
            PlanStage::GeneratingCandidates,
            PlanStage::Scoring,
            PlanStage::Selecting,
            PlanStage::Cached
        ]
    );
    assert_eq!(completed, Some((false, 0.0)));
}

#[tokio::test]
async fn invalid_configuration_is_rejected_before_any_work() {
    let dir = tempdir().unwrap();
    let network = FakeNetwork::new(line_network());
    let planner = planner(network.clone(), FakeCameras::new(vec![]), dir.path());

    let err = planner
        .plan_route(
            &region(),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            &RouteConfig { candidate_count: 0, ..config(1) },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidConfig { .. }));
    assert_eq!(network.fetches(), 0);
}
