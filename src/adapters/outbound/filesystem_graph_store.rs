use crate::common::{join_error, RouteError, RouteResult};
use crate::domains::route_planning::graph::{StreetGraph, StreetPetgraph};
use crate::domains::route_planning::ports::GraphStore;
use crate::domains::route_planning::types::RegionKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GRAPH_MAGIC: &[u8; 4] = b"LSRG";
pub const GRAPH_FORMAT_VERSION: u8 = 1;

/// Metadata written in front of every graph payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHeader {
    pub region: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Stores street graphs as `graphs/<name>.graph` under a base directory.
///
/// File layout: magic `LSRG`, version byte, little-endian u32 header length,
/// JSON header, bincode-encoded petgraph.
pub struct FilesystemGraphStore {
    dir: PathBuf,
}

impl FilesystemGraphStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.graph", name))
    }

    /// Reads only the header of a stored graph.
    pub fn read_header(&self, name: &str) -> RouteResult<Option<GraphHeader>> {
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(split_file(&bytes)?.0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn encode_graph(header: &GraphHeader, graph: &StreetGraph) -> RouteResult<Vec<u8>> {
    let header_bytes = serde_json::to_vec(header)?;
    let payload = bincode::serialize(graph.petgraph())?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| RouteError::Serialization("graph header too large".to_string()))?;

    let mut bytes = Vec::with_capacity(9 + header_bytes.len() + payload.len());
    bytes.extend_from_slice(GRAPH_MAGIC);
    bytes.push(GRAPH_FORMAT_VERSION);
    bytes.extend_from_slice(&header_len.to_le_bytes());
    bytes.extend_from_slice(&header_bytes);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_graph(bytes: &[u8]) -> RouteResult<(GraphHeader, StreetGraph)> {
    let (header, payload) = split_file(bytes)?;
    let petgraph: StreetPetgraph = bincode::deserialize(payload)?;
    let graph = StreetGraph::from_petgraph(petgraph)?;
    if graph.node_count() != header.node_count || graph.edge_count() != header.edge_count {
        return Err(RouteError::Serialization(format!(
            "graph payload does not match header ({} nodes / {} edges, header says {} / {})",
            graph.node_count(),
            graph.edge_count(),
            header.node_count,
            header.edge_count
        )));
    }
    Ok((header, graph))
}

fn split_file(bytes: &[u8]) -> RouteResult<(GraphHeader, &[u8])> {
    if bytes.len() < 9 || &bytes[..4] != GRAPH_MAGIC {
        return Err(RouteError::Serialization("not a street graph file".to_string()));
    }
    let version = bytes[4];
    if version != GRAPH_FORMAT_VERSION {
        return Err(RouteError::Serialization(format!(
            "unsupported graph format version {} (expected {})",
            version, GRAPH_FORMAT_VERSION
        )));
    }
    let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let header_end = 9usize
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| RouteError::Serialization("truncated graph header".to_string()))?;
    let header: GraphHeader = serde_json::from_slice(&bytes[9..header_end])?;
    Ok((header, &bytes[header_end..]))
}

/// Writes `bytes` next to `path` and renames it into place.
fn write_atomically(path: &Path, bytes: &[u8]) -> RouteResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    let written = fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl GraphStore for FilesystemGraphStore {
    async fn load_graph(&self, name: &str) -> RouteResult<Option<StreetGraph>> {
        let path = self.path_for(name);
        tokio::task::spawn_blocking(move || match fs::read(&path) {
            Ok(bytes) => decode_graph(&bytes).map(|(_, graph)| Some(graph)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RouteError::Storage(format!("reading {}: {}", path.display(), e))),
        })
        .await
        .map_err(join_error)?
    }

    async fn save_graph(&self, name: &str, region: &RegionKey, graph: &StreetGraph) -> RouteResult<()> {
        let header = GraphHeader {
            region: region.to_string(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            created_at: Utc::now(),
        };
        let bytes = encode_graph(&header, graph)?;
        let path = self.path_for(name);
        // runs to completion even if the caller is dropped, so the rename is all-or-nothing
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(join_error)?
    }

    async fn delete_graph(&self, name: &str) -> RouteResult<()> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
