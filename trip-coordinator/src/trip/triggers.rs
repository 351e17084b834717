//! Geofence arrivals the driver has not yet acknowledged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{GeoPoint, Stop, StopId};
use crate::prefs::{PreferenceStore, PrefsError, keys, load_json, save_json};

/// A geofence entry for a stop, with where and when it fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalTrigger {
    pub stop_id: StopId,
    pub location: GeoPoint,
    pub captured_at: DateTime<Utc>,
}

/// At most one trigger per stop, mirrored to the preference store.
pub struct ArrivalTriggerStore<S> {
    triggers: Mutex<Vec<ArrivalTrigger>>,
    prefs: Arc<S>,
}

impl<S: PreferenceStore> ArrivalTriggerStore<S> {
    pub fn new(prefs: Arc<S>) -> Self {
        Self {
            triggers: Mutex::new(Vec::new()),
            prefs,
        }
    }

    /// Replace the in-memory set with the persisted one.
    ///
    /// Returns the number of triggers restored.
    pub async fn load(&self) -> Result<usize, PrefsError> {
        let stored: Vec<ArrivalTrigger> = load_json(self.prefs.as_ref(), keys::ARRIVED_TRIGGERS)
            .await?
            .unwrap_or_default();
        let count = stored.len();
        *self.triggers.lock().await = stored;
        Ok(count)
    }

    /// Record a trigger for `stop_id`, replacing any earlier one.
    pub async fn put(
        &self,
        stop_id: StopId,
        location: GeoPoint,
        captured_at: DateTime<Utc>,
    ) -> Result<(), PrefsError> {
        let mut triggers = self.triggers.lock().await;
        let trigger = ArrivalTrigger {
            stop_id,
            location,
            captured_at,
        };
        match triggers.iter_mut().find(|t| t.stop_id == stop_id) {
            Some(existing) => *existing = trigger,
            None => triggers.push(trigger),
        }
        self.persist(&triggers).await
    }

    /// Drop the trigger for `stop_id`. Returns true if there was one.
    pub async fn remove(&self, stop_id: StopId) -> Result<bool, PrefsError> {
        let mut triggers = self.triggers.lock().await;
        let before = triggers.len();
        triggers.retain(|t| t.stop_id != stop_id);
        if triggers.len() == before {
            return Ok(false);
        }
        self.persist(&triggers).await?;
        Ok(true)
    }

    /// Triggers still worth asking about.
    ///
    /// Triggers for stops that are complete, deleted or no longer on the
    /// dispatch are dropped first.
    pub async fn list_unacknowledged(&self, stops: &[Stop]) -> Result<Vec<ArrivalTrigger>, PrefsError> {
        let mut triggers = self.triggers.lock().await;
        let before = triggers.len();
        triggers.retain(|t| {
            stops
                .iter()
                .find(|s| s.id == t.stop_id)
                .is_some_and(|s| !s.deleted && !s.is_complete())
        });
        if triggers.len() != before {
            debug!(dropped = before - triggers.len(), "swept stale arrival triggers");
            self.persist(&triggers).await?;
        }
        Ok(triggers.clone())
    }

    pub async fn has_trigger_for_current_stop(&self, current: StopId) -> bool {
        self.triggers
            .lock()
            .await
            .iter()
            .any(|t| t.stop_id == current)
    }

    async fn persist(&self, triggers: &[ArrivalTrigger]) -> Result<(), PrefsError> {
        save_json(self.prefs.as_ref(), keys::ARRIVED_TRIGGERS, triggers).await
    }
}
