//! In-memory dispatch repository for tests and the demo binary.
//!
//! Can be seeded from JSON files so the coordinator runs without a
//! backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{Dispatch, Stop};

use super::error::DispatchError;
use super::{DispatchKey, DispatchRepository};

/// Dispatch repository holding documents in memory.
#[derive(Clone, Default)]
pub struct MemoryDispatchRepository {
    dispatches: Arc<RwLock<HashMap<DispatchKey, Dispatch>>>,
    fetches: Arc<AtomicUsize>,
    completed_at: Arc<RwLock<HashMap<DispatchKey, DateTime<Utc>>>>,
}

impl MemoryDispatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a dispatch document.
    pub async fn insert(&self, key: DispatchKey, dispatch: Dispatch) -> Result<(), DispatchError> {
        dispatch.validate()?;
        self.dispatches.write().await.insert(key, dispatch);
        Ok(())
    }

    /// Load a dispatch document from a JSON file and store it under `key`.
    ///
    /// The dispatch id in the file must match the key.
    pub async fn load_file(
        &self,
        key: DispatchKey,
        path: impl AsRef<Path>,
    ) -> Result<(), DispatchError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DispatchError::Storage(format!("failed to read {:?}: {}", path, e)))?;
        let dispatch: Dispatch = serde_json::from_str(&json)
            .map_err(|e| DispatchError::Storage(format!("failed to parse {:?}: {}", path, e)))?;
        if dispatch.id != key.dispatch {
            return Err(DispatchError::Storage(format!(
                "{:?} holds dispatch {}, expected {}",
                path, dispatch.id, key.dispatch
            )));
        }
        self.insert(key, dispatch).await
    }

    /// The stored document, for assertions.
    pub async fn snapshot(&self, key: &DispatchKey) -> Option<Dispatch> {
        self.dispatches.read().await.get(key).cloned()
    }

    /// Number of `fetch_dispatch` calls served.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// When the trip was marked completed, if it was.
    pub async fn trip_completed_at(&self, key: &DispatchKey) -> Option<DateTime<Utc>> {
        self.completed_at.read().await.get(key).copied()
    }
}

impl DispatchRepository for MemoryDispatchRepository {
    async fn fetch_dispatch(&self, key: &DispatchKey) -> Result<Dispatch, DispatchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.dispatches
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(DispatchError::DispatchNotFound(key.dispatch))
    }

    async fn save_stop(&self, key: &DispatchKey, stop: &Stop) -> Result<(), DispatchError> {
        let mut dispatches = self.dispatches.write().await;
        let dispatch = dispatches
            .get_mut(key)
            .ok_or(DispatchError::DispatchNotFound(key.dispatch))?;
        let slot = dispatch
            .stop_mut(stop.id)
            .ok_or(DispatchError::StopNotFound {
                dispatch: key.dispatch,
                stop: stop.id,
            })?;
        *slot = stop.clone();
        Ok(())
    }

    async fn mark_trip_completed(
        &self,
        key: &DispatchKey,
        at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let mut dispatches = self.dispatches.write().await;
        let dispatch = dispatches
            .get_mut(key)
            .ok_or(DispatchError::DispatchNotFound(key.dispatch))?;
        dispatch.trip_completed = true;
        self.completed_at.write().await.insert(*key, at);
        Ok(())
    }
}
