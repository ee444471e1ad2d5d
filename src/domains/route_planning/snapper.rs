use super::graph::StreetGraph;
use super::types::{Coordinate, NodeId};
use crate::common::{RouteError, RouteResult};

/// Maps `coordinate` to the nearest graph node within `threshold_m`.
///
/// Distances are great-circle. Exactly equal distances resolve to the lowest
/// node id.
pub fn snap(graph: &StreetGraph, coordinate: &Coordinate, threshold_m: f64) -> RouteResult<NodeId> {
    let nearest = graph
        .nodes()
        .map(|(_, node)| (coordinate.haversine_m(&node.position), node.id))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let Some((distance_m, node_id)) = nearest else {
        return Err(RouteError::SnapOutOfRange { distance_m: f64::INFINITY, threshold_m });
    };
    if distance_m > threshold_m {
        return Err(RouteError::SnapOutOfRange { distance_m, threshold_m });
    }

    tracing::debug!(
        lat = coordinate.lat,
        lon = coordinate.lon,
        node_id,
        distance_m,
        "snapped coordinate to node"
    );
    Ok(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::route_planning::graph::test_graphs::{line, M_PER_DEG};
    use crate::domains::route_planning::graph::{RawNetwork, RawNode};

    #[test]
    fn snaps_to_nearest_node() {
        let graph = line(5, 100.0);
        let near_two = Coordinate::new(10.0 / M_PER_DEG, 205.0 / M_PER_DEG);
        assert_eq!(snap(&graph, &near_two, 50.0), Ok(2));
    }

    #[test]
    fn distant_coordinates_fail_with_measured_distance() {
        let graph = line(5, 100.0);
        let far = Coordinate::new(1_000.0 / M_PER_DEG, 0.0);
        match snap(&graph, &far, 500.0) {
            Err(RouteError::SnapOutOfRange { distance_m, threshold_m }) => {
                assert!((distance_m - 1_000.0).abs() < 1.0);
                assert_eq!(threshold_m, 500.0);
            }
            other => panic!("expected SnapOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn equal_distances_prefer_lowest_id() {
        let raw = RawNetwork {
            nodes: vec![
                RawNode { id: 7, lat: 0.0, lon: 0.001 },
                RawNode { id: 3, lat: 0.0, lon: -0.001 },
            ],
            edges: vec![],
        };
        let graph = StreetGraph::from_raw("tie", raw).unwrap();
        assert_eq!(snap(&graph, &Coordinate::new(0.0, 0.0), 500.0), Ok(3));
    }
}
