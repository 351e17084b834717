//! In-memory preference store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{PreferenceStore, PrefsError};

/// Preference store backed by a shared map.
///
/// Clones share the same underlying map, so a test can hold one handle
/// while the components under test hold others.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PrefsError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, PrefsError> {
        Ok(self.values.read().await.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<(), PrefsError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{load_json, save_json};

    #[tokio::test]
    async fn set_get_remove() {
        let store = MemoryPreferenceStore::new();
        assert!(store.is_empty().await);

        store.set("a", "1".into()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert!(store.contains("a").await.unwrap());

        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(!store.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryPreferenceStore::new();
        let other = store.clone();
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(other.len().await, 1);
    }

    #[tokio::test]
    async fn json_helpers() {
        let store = MemoryPreferenceStore::new();
        save_json(&store, "list", &vec![1u32, 2, 3]).await.unwrap();
        let list: Option<Vec<u32>> = load_json(&store, "list").await.unwrap();
        assert_eq!(list, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u32>> = load_json(&store, "nope").await.unwrap();
        assert!(missing.is_none());

        store.set("bad", "not json".into()).await.unwrap();
        let err = load_json::<_, Vec<u32>>(&store, "bad").await.unwrap_err();
        assert!(matches!(err, PrefsError::Malformed { ref key, .. } if key == "bad"));
    }
}
