//! Cache storage: the set of named buckets.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use swr_net::{Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use url::Url;

use crate::{Cache, CacheEntry, CacheError};

/// Storage holding every cache bucket.
///
/// Writes to the same key are last-writer-wins; there are no multi-key
/// transactions except [`CacheStore::put_all`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a bucket, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Check if a bucket exists.
    async fn has(&self, name: &str) -> bool;

    /// Delete a bucket. Returns whether it existed.
    async fn delete(&self, name: &str) -> bool;

    /// All bucket names, sorted.
    async fn keys(&self) -> Vec<String>;

    /// Look up a GET request in one bucket.
    async fn match_url(&self, name: &str, url: &Url) -> Option<CacheEntry>;

    /// Store one response, opening the bucket if needed.
    async fn put(&self, name: &str, request: &Request, response: &Response)
        -> Result<(), CacheError>;

    /// Store a batch of responses. Either every entry is committed or none is.
    async fn put_all(&self, name: &str, entries: &[(Request, Response)]) -> Result<(), CacheError>;

    /// Request keys stored in one bucket, sorted.
    async fn entry_keys(&self, name: &str) -> Result<Vec<String>, CacheError>;
}

/// Serializable image of a whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub caches: Vec<Cache>,
}

/// In-memory [`CacheStore`].
///
/// Cloning yields another handle to the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    caches: Arc<RwLock<HashMap<String, Cache>>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot.
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        let caches = snapshot
            .caches
            .into_iter()
            .map(|cache| (cache.name.clone(), cache))
            .collect();
        Self {
            caches: Arc::new(RwLock::new(caches)),
        }
    }

    /// Capture the current contents.
    pub async fn snapshot(&self) -> CacheSnapshot {
        let caches = self.caches.read().await;
        let mut caches: Vec<Cache> = caches.values().cloned().collect();
        caches.sort_by(|a, b| a.name.cmp(&b.name));
        CacheSnapshot { caches }
    }

    /// Load a store from a JSON snapshot file. A missing file yields an
    /// empty store.
    pub async fn load(path: &Path) -> Result<Self, CacheError> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: CacheSnapshot = serde_json::from_slice(&data)?;
        debug!(path = %path.display(), caches = snapshot.caches.len(), "Snapshot loaded");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a JSON snapshot file.
    pub async fn save(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = self.snapshot().await;
        let data = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, data).await?;
        debug!(path = %path.display(), caches = snapshot.caches.len(), "Snapshot saved");
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        Ok(())
    }

    async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    async fn delete(&self, name: &str) -> bool {
        self.caches.write().await.remove(name).is_some()
    }

    async fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    async fn match_url(&self, name: &str, url: &Url) -> Option<CacheEntry> {
        let caches = self.caches.read().await;
        let entry = caches.get(name)?.match_url(url).cloned();
        trace!(cache = name, url = %url, hit = entry.is_some(), "Cache lookup");
        entry
    }

    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: &Response,
    ) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
            .put(request, response)
    }

    async fn put_all(&self, name: &str, entries: &[(Request, Response)]) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        let mut staged = caches.get(name).cloned().unwrap_or_else(|| Cache::new(name));
        for (request, response) in entries {
            staged.put(request, response)?;
        }
        caches.insert(name.to_string(), staged);
        Ok(())
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>, CacheError> {
        let caches = self.caches.read().await;
        let cache = caches
            .get(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        Ok(cache.keys().into_iter().map(str::to_string).collect())
    }
}
