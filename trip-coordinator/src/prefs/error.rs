//! Preference store error types.

/// Errors from a preference store.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// Reading or writing the backing file failed
    #[error("preference storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded
    #[error("preference value for {key} is malformed: {message}")]
    Malformed { key: String, message: String },
}
