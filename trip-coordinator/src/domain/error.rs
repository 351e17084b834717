//! Domain error types.
//!
//! These errors represent malformed dispatch data. They are distinct from
//! collaborator (storage, repository) failures.

use super::{ActionType, StopId};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Two stops in one dispatch share an id
    #[error("duplicate stop id {0}")]
    DuplicateStop(StopId),

    /// A stop declares the same checkpoint twice
    #[error("stop {stop} declares {action} more than once")]
    DuplicateAction { stop: StopId, action: ActionType },

    /// An action names a different stop or dispatch than its owner
    #[error("stop {0} holds an action belonging to another stop or dispatch")]
    MismatchedAction(StopId),

    /// A response was recorded for a checkpoint the stop doesn't have
    #[error("stop {stop} does not declare action {action}")]
    ActionNotDeclared { stop: StopId, action: ActionType },

    /// The stop is not part of the dispatch
    #[error("stop {0} not found in dispatch")]
    StopNotFound(StopId),
}
