//! Route recomputation after a stop completes.
//!
//! The coordinator only asks for a recomputation through
//! [`RouteRecalcTrigger`]; [`RouteRecalcHandle`] answers by running a
//! [`RouteRecalcRetryLoop`] against a [`RouteEngine`] in the background.

mod config;
mod engine;
mod result;
mod retry;

pub use config::RetryConfig;
pub use engine::{RouteEngine, ScriptedRouteEngine};
pub use result::{Classification, RouteCalcResult, RouteCalcState, RouteSummary};
pub use retry::{RetryOutcome, RouteRecalcHandle, RouteRecalcRetryLoop};

use crate::domain::DispatchId;

/// Fire-and-forget request for a new route.
pub trait RouteRecalcTrigger: Send + Sync {
    /// Start a recomputation, replacing any that is in flight.
    fn request_recalc(&self, dispatch: DispatchId);

    /// Stop any in-flight recomputation.
    fn cancel(&self);
}
