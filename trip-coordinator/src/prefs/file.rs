//! File-backed preference store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{PreferenceStore, PrefsError};

/// Preference store persisted as a single JSON object on disk.
///
/// The whole map is kept in memory and rewritten on every change; the
/// stored values are small scalars and short lists.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FilePreferenceStore {
    /// Open the store at `path`, loading existing values.
    ///
    /// A missing file is treated as an empty store; the file is created on
    /// the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| PrefsError::Malformed {
                    key: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Arc::new(RwLock::new(values)),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), PrefsError> {
        // Create parent directories if needed
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(values).map_err(|e| PrefsError::Malformed {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PrefsError> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    async fn contains(&self, key: &str) -> Result<bool, PrefsError> {
        Ok(self.values.read().await.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<(), PrefsError> {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}
