use super::types::{Coordinate, NodeId};
use crate::common::{RouteError, RouteResult};
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Undirected;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Walkable network as delivered by a network data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNetwork {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub length_m: Option<f64>,
    pub geometry: Option<Vec<Coordinate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetNode {
    pub id: NodeId,
    pub position: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetEdge {
    pub length_m: f64,
    /// Polyline from the lower-index endpoint to the higher-index endpoint,
    /// endpoints included.
    pub geometry: Option<Vec<Coordinate>>,
}

pub type StreetPetgraph = Graph<StreetNode, StreetEdge, Undirected>;

/// Immutable walkable street graph of one region.
///
/// Nodes are stored in ascending id order, so node index order and id order
/// agree; searches that break ties on index are therefore id-deterministic.
#[derive(Debug, Clone)]
pub struct StreetGraph {
    graph: StreetPetgraph,
    index_by_id: HashMap<NodeId, NodeIndex>,
}

impl StreetGraph {
    /// Converts a raw network into the internal representation.
    pub fn from_raw(region: &str, raw: RawNetwork) -> RouteResult<Self> {
        if raw.nodes.is_empty() {
            return Err(RouteError::RegionNotFound { region: region.to_string() });
        }

        let mut nodes = raw.nodes;
        nodes.sort_by_key(|n| n.id);
        nodes.dedup_by_key(|n| n.id);

        let mut graph = StreetPetgraph::with_capacity(nodes.len(), raw.edges.len());
        for node in nodes {
            graph.add_node(StreetNode { id: node.id, position: Coordinate::new(node.lat, node.lon) });
        }
        let index_by_id = index_nodes(&graph);

        let mut skipped = 0usize;
        for edge in raw.edges {
            let (Some(&a), Some(&b)) = (index_by_id.get(&edge.source), index_by_id.get(&edge.target))
            else {
                skipped += 1;
                continue;
            };
            let geometry = edge.geometry.filter(|g| g.len() >= 2).map(|mut g| {
                if a > b {
                    g.reverse();
                }
                g
            });
            let length_m = match edge.length_m {
                Some(length) => length,
                None => match &geometry {
                    Some(g) => polyline_length_m(g),
                    None => graph[a].position.haversine_m(&graph[b].position),
                },
            };
            if !length_m.is_finite() || length_m < 0.0 {
                return Err(RouteError::Serialization(format!(
                    "edge {}-{} has invalid length {}",
                    edge.source, edge.target, length_m
                )));
            }
            graph.add_edge(a, b, StreetEdge { length_m, geometry });
        }
        if skipped > 0 {
            tracing::warn!(region, skipped, "dropped edges referencing unknown nodes");
        }

        Ok(Self { graph, index_by_id })
    }

    /// Wraps a deserialized petgraph, restoring the id lookup.
    pub fn from_petgraph(graph: StreetPetgraph) -> RouteResult<Self> {
        let ordered = graph
            .node_indices()
            .zip(graph.node_indices().skip(1))
            .all(|(a, b)| graph[a].id < graph[b].id);
        if !ordered {
            return Err(RouteError::Serialization(
                "stored graph nodes are not in ascending id order".to_string(),
            ));
        }
        let index_by_id = index_nodes(&graph);
        Ok(Self { graph, index_by_id })
    }

    pub fn petgraph(&self) -> &StreetPetgraph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.index_by_id.get(&id).copied()
    }

    pub fn node(&self, index: NodeIndex) -> &StreetNode {
        &self.graph[index]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &StreetNode)> {
        self.graph.node_indices().map(move |i| (i, &self.graph[i]))
    }

    /// Neighbours of `index` with the connecting edge, in insertion order.
    pub fn neighbours(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeIndex, f64)> + '_ {
        self.graph
            .edges(index)
            .map(move |e| {
                let other = if e.source() == index { e.target() } else { e.source() };
                (other, e.id(), e.weight().length_m)
            })
    }

    /// Shortest of the parallel edges joining `a` and `b`.
    pub fn shortest_edge(&self, a: NodeIndex, b: NodeIndex) -> Option<(EdgeIndex, &StreetEdge)> {
        self.graph
            .edges_connecting(a, b)
            .min_by(|x, y| x.weight().length_m.total_cmp(&y.weight().length_m).then(x.id().cmp(&y.id())))
            .map(|e| (e.id(), e.weight()))
    }

    /// Total length of a node path, using the shortest edge between neighbours.
    pub fn path_length_m(&self, path: &[NodeIndex]) -> f64 {
        path.windows(2)
            .filter_map(|pair| self.shortest_edge(pair[0], pair[1]))
            .map(|(_, edge)| edge.length_m)
            .sum()
    }

    /// Polyline of a node path, following stored edge geometry where present.
    pub fn path_geometry(&self, path: &[NodeIndex]) -> Vec<Coordinate> {
        let mut line: Vec<Coordinate> = Vec::with_capacity(path.len());
        if let Some(&first) = path.first() {
            line.push(self.graph[first].position);
        }
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            match self.shortest_edge(from, to).and_then(|(_, e)| e.geometry.as_ref()) {
                Some(geometry) => {
                    let forward = from < to;
                    let points: Box<dyn Iterator<Item = &Coordinate>> = if forward {
                        Box::new(geometry.iter())
                    } else {
                        Box::new(geometry.iter().rev())
                    };
                    line.extend(points.skip(1).copied());
                }
                None => line.push(self.graph[to].position),
            }
        }
        line
    }

    pub fn node_ids(&self, path: &[NodeIndex]) -> Vec<NodeId> {
        path.iter().map(|&i| self.graph[i].id).collect()
    }
}

fn index_nodes(graph: &StreetPetgraph) -> HashMap<NodeId, NodeIndex> {
    graph.node_indices().map(|i| (graph[i].id, i)).collect()
}

pub fn polyline_length_m(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| w[0].haversine_m(&w[1])).sum()
}
