//! Caching layer for dispatch documents.
//!
//! The coordinator re-reads the stop list for every event it handles.
//! Documents are served cache-first; writes go through to the backing
//! repository and then update the cached copy, so the cache never serves
//! a stop state older than the last write made through it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::dispatch::{DispatchError, DispatchKey, DispatchRepository};
use crate::domain::{Dispatch, Stop};

/// Cached dispatch entry.
type DispatchEntry = Arc<Dispatch>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_capacity: 16,
        }
    }
}

impl CacheConfig {
    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached dispatches.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}

/// Dispatch repository with a read-through cache.
///
/// Wraps any [`DispatchRepository`] and caches fetched documents.
pub struct CachedDispatchRepository<R> {
    inner: R,
    documents: MokaCache<DispatchKey, DispatchEntry>,
}

impl<R: DispatchRepository> CachedDispatchRepository<R> {
    /// Create a new cached repository.
    pub fn new(inner: R, config: &CacheConfig) -> Self {
        let documents = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, documents }
    }

    /// Access the underlying repository for operations that bypass cache.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Get cache statistics.
    pub fn cache_entry_count(&self) -> u64 {
        self.documents.entry_count()
    }

    /// Drop the cached copy of one dispatch.
    pub async fn invalidate(&self, key: &DispatchKey) {
        self.documents.invalidate(key).await;
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.documents.invalidate_all();
    }
}

impl<R: DispatchRepository> DispatchRepository for CachedDispatchRepository<R> {
    async fn fetch_dispatch(&self, key: &DispatchKey) -> Result<Dispatch, DispatchError> {
        // Try cache first
        if let Some(cached) = self.documents.get(key).await {
            trace!(dispatch = %key, "dispatch cache hit");
            return Ok(cached.as_ref().clone());
        }

        let dispatch = self.inner.fetch_dispatch(key).await?;
        self.documents
            .insert(*key, Arc::new(dispatch.clone()))
            .await;
        Ok(dispatch)
    }

    async fn save_stop(&self, key: &DispatchKey, stop: &Stop) -> Result<(), DispatchError> {
        self.inner.save_stop(key, stop).await?;

        if let Some(cached) = self.documents.get(key).await {
            let mut updated = cached.as_ref().clone();
            match updated.stop_mut(stop.id) {
                Some(slot) => {
                    *slot = stop.clone();
                    self.documents.insert(*key, Arc::new(updated)).await;
                }
                None => self.documents.invalidate(key).await,
            }
        }
        Ok(())
    }

    async fn mark_trip_completed(
        &self,
        key: &DispatchKey,
        at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        self.inner.mark_trip_completed(key, at).await?;
        self.documents.invalidate(key).await;
        Ok(())
    }
}
