use super::graph::StreetGraph;
use super::types::NodeId;
use crate::common::{RouteError, RouteResult};
use ordered_float::OrderedFloat;
use petgraph::graph::NodeIndex;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

/// A loop-free path between the snapped endpoints, not yet scored.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePath {
    /// Generation order, starting at 1 for the pure shortest path.
    pub rank: usize,
    pub nodes: Vec<NodeIndex>,
    pub length_m: f64,
}

/// Lazily enumerates simple paths in order of non-decreasing length
/// (Yen's algorithm).
///
/// Each `next` call confirms one more path; the sequence is finite (at most
/// `k` items) and cannot be restarted.
pub struct KShortestPaths<'g> {
    graph: &'g StreetGraph,
    start: NodeIndex,
    end: NodeIndex,
    k: usize,
    emitted: Vec<CandidatePath>,
    pending: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, Vec<NodeIndex>)>>,
    seen: HashSet<Vec<NodeIndex>>,
    discovered: u64,
    exhausted: bool,
}

impl<'g> KShortestPaths<'g> {
    pub fn new(graph: &'g StreetGraph, start: NodeIndex, end: NodeIndex, k: usize) -> Self {
        Self {
            graph,
            start,
            end,
            k,
            emitted: Vec::new(),
            pending: BinaryHeap::new(),
            seen: HashSet::new(),
            discovered: 0,
            exhausted: false,
        }
    }

    fn emit(&mut self, nodes: Vec<NodeIndex>, length_m: f64) -> CandidatePath {
        let candidate = CandidatePath { rank: self.emitted.len() + 1, nodes, length_m };
        self.emitted.push(candidate.clone());
        candidate
    }

    fn queue(&mut self, nodes: Vec<NodeIndex>) {
        if self.seen.insert(nodes.clone()) {
            let length = self.graph.path_length_m(&nodes);
            self.discovered += 1;
            self.pending.push(Reverse((OrderedFloat(length), self.discovered, nodes)));
        }
    }

    /// Queues every deviation of the most recently emitted path.
    fn expand_last(&mut self) {
        let Some(last) = self.emitted.last().map(|c| c.nodes.clone()) else {
            return;
        };
        for i in 0..last.len().saturating_sub(1) {
            let spur = last[i];
            let root = &last[..=i];

            let mut banned_edges = BTreeSet::new();
            for prior in &self.emitted {
                if prior.nodes.len() > i + 1 && prior.nodes[..=i] == *root {
                    banned_edges.insert(edge_key(prior.nodes[i], prior.nodes[i + 1]));
                }
            }
            let banned_nodes: HashSet<NodeIndex> = root[..i].iter().copied().collect();

            if let Some(spur_path) = shortest_path(self.graph, spur, self.end, &banned_nodes, &banned_edges) {
                let mut total = root[..i].to_vec();
                total.extend(spur_path);
                self.queue(total);
            }
        }
    }
}

impl Iterator for KShortestPaths<'_> {
    type Item = CandidatePath;

    fn next(&mut self) -> Option<CandidatePath> {
        if self.exhausted || self.emitted.len() >= self.k {
            return None;
        }

        if self.emitted.is_empty() {
            let Some(first) = shortest_path(self.graph, self.start, self.end, &HashSet::new(), &BTreeSet::new())
            else {
                self.exhausted = true;
                return None;
            };
            self.seen.insert(first.clone());
            let length = self.graph.path_length_m(&first);
            return Some(self.emit(first, length));
        }

        self.expand_last();
        match self.pending.pop() {
            Some(Reverse((length, _, nodes))) => Some(self.emit(nodes, length.into_inner())),
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

/// Up to `k` shortest loop-free paths from `start` to `end`, shortest first.
///
/// Fails with `NoPathFound` when the endpoints are not connected.
pub fn k_shortest_paths(
    graph: &StreetGraph,
    start: NodeId,
    end: NodeId,
    k: usize,
) -> RouteResult<Vec<CandidatePath>> {
    let no_path = || RouteError::NoPathFound { start, end };
    let start_index = graph.index_of(start).ok_or_else(no_path)?;
    let end_index = graph.index_of(end).ok_or_else(no_path)?;

    let candidates: Vec<CandidatePath> = KShortestPaths::new(graph, start_index, end_index, k).collect();
    if candidates.is_empty() {
        return Err(no_path());
    }
    tracing::debug!(start, end, requested = k, found = candidates.len(), "generated candidate paths");
    Ok(candidates)
}

fn edge_key(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Dijkstra over the street graph avoiding `banned_nodes` and the node pairs
/// in `banned_edges`. Ties on distance resolve to the lower node index.
pub fn shortest_path(
    graph: &StreetGraph,
    from: NodeIndex,
    to: NodeIndex,
    banned_nodes: &HashSet<NodeIndex>,
    banned_edges: &BTreeSet<(NodeIndex, NodeIndex)>,
) -> Option<Vec<NodeIndex>> {
    if banned_nodes.contains(&from) || banned_nodes.contains(&to) {
        return None;
    }

    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<NodeIndex>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[from.index()] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), from)));

    while let Some(Reverse((OrderedFloat(cost), node))) = heap.pop() {
        if node == to {
            let mut path = vec![to];
            let mut cursor = to;
            while let Some(p) = prev[cursor.index()] {
                path.push(p);
                cursor = p;
            }
            path.reverse();
            return Some(path);
        }
        if cost > dist[node.index()] {
            continue;
        }
        for (neighbour, _, length) in graph.neighbours(node) {
            if neighbour == node
                || banned_nodes.contains(&neighbour)
                || banned_edges.contains(&edge_key(node, neighbour))
            {
                continue;
            }
            let next = cost + length;
            if next < dist[neighbour.index()] {
                dist[neighbour.index()] = next;
                prev[neighbour.index()] = Some(node);
                heap.push(Reverse((OrderedFloat(next), neighbour)));
            }
        }
    }
    None
}
