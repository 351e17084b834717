//! Stop completion: gating, arrival triggers and the coordinator that ties
//! them to the dispatch, the panel and route recomputation.

mod coordinator;
pub mod gate;
mod outcome;
mod triggers;

pub use coordinator::StopCompletionCoordinator;
pub use gate::GateRejection;
pub use outcome::{CompletionOutcome, CoordinatorError, EventOrigin, PromptOutcome, StopEvent};
pub use triggers::{ArrivalTrigger, ArrivalTriggerStore};
