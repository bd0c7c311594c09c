// In-memory cache store for watched API paths.
// Serves snapshots under a read lock and swaps in fresh entries after each refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::github::{ApiClient, ApiResponse};

use super::refresher::Refresher;

/// Deadline for a single refresh, including every page it follows.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Default period of the background refresh loop.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Snapshot of one watched path. Never mutated; a refresh builds a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: String,
    pub payload: Vec<u8>,
    /// When the payload was fetched.
    pub last_updated: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(path: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            payload,
            last_updated: Utc::now(),
        }
    }
}

/// Timing knobs for the store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Per-refresh deadline.
    pub fetch_timeout: Duration,
    /// Period between background refresh rounds.
    pub refresh_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

pub(super) struct Inner {
    pub(super) client: Arc<dyn ApiClient>,
    /// Path -> current snapshot. A path is present iff it is watched.
    pub(super) entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    pub(super) config: CacheConfig,
    pub(super) refresher: Mutex<Refresher>,
}

/// Handle to the cache. Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct CacheStore {
    pub(super) inner: Arc<Inner>,
}

impl CacheStore {
    pub fn new(client: Arc<dyn ApiClient>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                entries: RwLock::new(HashMap::new()),
                config,
                refresher: Mutex::new(Refresher::Idle),
            }),
        }
    }

    pub fn with_defaults(client: Arc<dyn ApiClient>) -> Self {
        Self::new(client, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Serve the snapshot for `path`, or pass the request through to the origin
    /// when the path is not watched. Misses are never cached.
    pub async fn fetch(&self, path: &str) -> Result<ApiResponse> {
        if let Some(entry) = self.entry(path).await {
            return Ok(ApiResponse::ok(entry.payload.clone()));
        }
        self.inner.client.fetch(path).await
    }

    /// Start keeping `path` fresh. Populates the first snapshot synchronously so
    /// startup can fail fast; a path that is already watched is left alone.
    pub async fn watch(&self, path: &str) -> Result<()> {
        if self.is_watched(path).await {
            return Ok(());
        }
        self.refresh_one(path, self.inner.config.fetch_timeout).await
    }

    /// Re-fetch every page of `path` and swap in a new snapshot.
    ///
    /// An empty payload leaves the previous snapshot in place. On error the
    /// previous snapshot is also kept and the error returned.
    pub async fn refresh_one(&self, path: &str, timeout: Duration) -> Result<()> {
        let payload = tokio::time::timeout(timeout, self.inner.client.fetch_all(path))
            .await
            .map_err(|_| CacheError::Timeout {
                path: path.to_string(),
                after: timeout,
            })??;

        if payload.is_empty() {
            debug!(path, "Empty payload, keeping previous snapshot");
            return Ok(());
        }

        let entry = Arc::new(CacheEntry::new(path, payload));
        // Network I/O is done, the lock only covers the swap.
        self.inner
            .entries
            .write()
            .await
            .insert(path.to_string(), entry);
        debug!(path, "Snapshot refreshed");
        Ok(())
    }

    /// Current snapshot for `path`, if watched.
    pub async fn entry(&self, path: &str) -> Option<Arc<CacheEntry>> {
        self.inner.entries.read().await.get(path).cloned()
    }

    pub async fn is_watched(&self, path: &str) -> bool {
        self.inner.entries.read().await.contains_key(path)
    }

    /// Snapshot of the watched path set.
    pub async fn watched_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.entries.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}
