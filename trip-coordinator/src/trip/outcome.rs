//! Inputs and results of the stop completion coordinator.

use crate::dispatch::DispatchError;
use crate::domain::{ActionType, DispatchId, DomainError, StopId};
use crate::events::ReasonTier;
use crate::notify::{EnqueueOutcome, MessageId, SchedulerError};
use crate::prefs::PrefsError;

use super::gate::GateRejection;

/// Where a stop event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// The vehicle entered the stop's geofence.
    Geofence,
    /// The driver acknowledged the action.
    Driver,
    /// Synthesized by the coordinator itself.
    System,
}

impl EventOrigin {
    pub fn reason_tier(self) -> ReasonTier {
        match self {
            EventOrigin::Geofence => ReasonTier::Normal,
            EventOrigin::Driver => ReasonTier::Manual,
            EventOrigin::System => ReasonTier::Auto,
        }
    }
}

/// A request to complete one action at one stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopEvent {
    pub dispatch_id: DispatchId,
    pub stop_id: StopId,
    pub action: ActionType,
    pub origin: EventOrigin,
}

impl StopEvent {
    pub fn new(dispatch_id: DispatchId, stop_id: StopId, action: ActionType, origin: EventOrigin) -> Self {
        Self {
            dispatch_id,
            stop_id,
            action,
            origin,
        }
    }
}

/// What handling a stop event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Vehicle or customer identity is not configured; nothing was done.
    NoOp,
    /// The gate refused the action.
    Rejected(GateRejection),
    /// The stop does not declare this action.
    NotDeclared,
    /// The action was already completed.
    AlreadyCompleted,
    /// The driver declined the arrival prompt.
    Declined,
    Accepted {
        stop: StopId,
        /// The stop became complete with this event.
        stop_completed: bool,
        /// Earlier stops that were departed automatically, in trip order.
        auto_departed: Vec<StopId>,
        /// The current stop after handling.
        current_stop: Option<StopId>,
        trip_completed: bool,
    },
}

impl CompletionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CompletionOutcome::Accepted { .. })
    }
}

/// What a geofence arrival did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    NoOp,
    /// The trigger was stored but the gate refused the arrival.
    Rejected(GateRejection),
    /// The stop is deleted, unknown, or already arrived at.
    Ignored,
    Prompted {
        message: MessageId,
        enqueue: EnqueueOutcome,
    },
}

/// Failures of the coordinator's collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("dispatch repository error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("preference store error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("notification error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("invalid stop data: {0}")]
    Domain(#[from] DomainError),
}
