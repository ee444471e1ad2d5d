use crate::common::{join_error, RouteError, RouteResult};
use crate::domains::route_planning::ports::ResultStore;
use crate::domains::route_planning::result_cache::CachedResult;
use crate::domains::route_planning::types::RequestFingerprint;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Results as `results/<fingerprint>.json`, one file per fingerprint.
///
/// Entries are published with a hard link from a fully written temp file, so
/// a file either holds a complete result or does not exist, and an existing
/// file is never replaced.
pub struct FileResultStore {
    dir: PathBuf,
}

impl FileResultStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, fingerprint: &RequestFingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.as_str()))
    }
}

fn read_result(path: &Path) -> RouteResult<Option<CachedResult>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn publish_once(dir: &Path, path: &Path, result: &CachedResult) -> RouteResult<CachedResult> {
    fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(result)?;
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    let published = fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(&bytes)?;
            f.sync_all()
        })
        .and_then(|_| fs::hard_link(&tmp, path));
    let _ = fs::remove_file(&tmp);

    match published {
        Ok(()) => Ok(result.clone()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => read_result(path)?.ok_or_else(|| {
            RouteError::Storage(format!("{} vanished while being read", path.display()))
        }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn load_result(&self, fingerprint: &RequestFingerprint) -> RouteResult<Option<CachedResult>> {
        let path = self.path_for(fingerprint);
        tokio::task::spawn_blocking(move || read_result(&path))
            .await
            .map_err(join_error)?
    }

    async fn insert_result(&self, result: CachedResult) -> RouteResult<CachedResult> {
        let dir = self.dir.clone();
        let path = self.path_for(&result.fingerprint);
        let stored = tokio::task::spawn_blocking(move || publish_once(&dir, &path, &result))
            .await
            .map_err(join_error)??;
        tracing::debug!(fingerprint = %stored.fingerprint, "stored route result");
        Ok(stored)
    }
}

/// Process-local result store for tests and one-off runs.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<RequestFingerprint, CachedResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn load_result(&self, fingerprint: &RequestFingerprint) -> RouteResult<Option<CachedResult>> {
        Ok(self.results.read().await.get(fingerprint).cloned())
    }

    async fn insert_result(&self, result: CachedResult) -> RouteResult<CachedResult> {
        let mut results = self.results.write().await;
        Ok(results
            .entry(result.fingerprint.clone())
            .or_insert(result)
            .clone())
    }
}
