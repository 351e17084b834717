//! Durable key/value preferences.
//!
//! The coordinator, scheduler and retry loop keep small pieces of state
//! (active dispatch, current stop, last sent message id, ...) in a
//! [`PreferenceStore`] so a process restart can pick up where it left off.
//! Values are strings; structured values are stored as JSON through
//! [`load_json`] and [`save_json`].

mod error;
mod file;
pub mod keys;
mod memory;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use error::PrefsError;
pub use file::FilePreferenceStore;
pub use memory::MemoryPreferenceStore;

/// Async string-keyed preference storage.
pub trait PreferenceStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, PrefsError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), PrefsError>> + Send;

    /// Returns true if a value is stored under `key`.
    fn contains(&self, key: &str) -> impl Future<Output = Result<bool, PrefsError>> + Send;

    /// Remove the value stored under `key`, if any.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), PrefsError>> + Send;
}

/// Load a JSON-encoded value.
pub async fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, PrefsError>
where
    S: PreferenceStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| PrefsError::Malformed {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Store a value as JSON.
pub async fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), PrefsError>
where
    S: PreferenceStore + ?Sized,
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|e| PrefsError::Malformed {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, raw).await
}
