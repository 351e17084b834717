//! Dispatch repository error types.

use std::fmt;

use crate::domain::{DispatchId, DomainError, StopId};

/// Errors from the dispatch document store.
#[derive(Debug)]
pub enum DispatchError {
    /// No dispatch document for this key
    DispatchNotFound(DispatchId),

    /// The dispatch has no stop with this id
    StopNotFound { dispatch: DispatchId, stop: StopId },

    /// The document failed validation
    Invalid(DomainError),

    /// The backing store could not be read or written
    Storage(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::DispatchNotFound(id) => write!(f, "dispatch {id} not found"),
            DispatchError::StopNotFound { dispatch, stop } => {
                write!(f, "stop {stop} not found in dispatch {dispatch}")
            }
            DispatchError::Invalid(e) => write!(f, "invalid dispatch document: {e}"),
            DispatchError::Storage(msg) => write!(f, "dispatch storage error: {msg}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        DispatchError::Invalid(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let id = DispatchId::parse("12").unwrap();
        let err = DispatchError::DispatchNotFound(id);
        assert_eq!(err.to_string(), "dispatch 12 not found");

        let err = DispatchError::StopNotFound {
            dispatch: id,
            stop: StopId(4),
        };
        assert_eq!(err.to_string(), "stop 4 not found in dispatch 12");

        let err = DispatchError::from(DomainError::DuplicateStop(StopId(1)));
        assert_eq!(err.to_string(), "invalid dispatch document: duplicate stop id 1");
        assert!(std::error::Error::source(&err).is_some());
    }
}
