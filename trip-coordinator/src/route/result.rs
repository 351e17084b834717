//! Route computation results and how the retry loop reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DispatchId, StopId};

/// Status reported by the route engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteCalcState {
    Success,
    Error,
    Ignore,
}

/// Raw result of one route computation.
///
/// `dispatch_id` is the engine's string form and may not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCalcResult {
    pub state: RouteCalcState,
    #[serde(default)]
    pub error: String,
    pub dispatch_id: String,
    #[serde(default)]
    pub stop_list: Vec<StopId>,
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub total_hours: f64,
}

/// What the retry loop should do with a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success,
    /// Error with a message; retrying will not help.
    Terminal(String),
    /// Error without a message; worth retrying.
    Transient,
    /// Not about the active dispatch, or flagged to ignore.
    Ignore,
}

impl RouteCalcResult {
    pub fn success(dispatch: DispatchId, stop_list: Vec<StopId>, total_distance: f64, total_hours: f64) -> Self {
        Self {
            state: RouteCalcState::Success,
            error: String::new(),
            dispatch_id: dispatch.to_string(),
            stop_list,
            total_distance,
            total_hours,
        }
    }

    pub fn error(dispatch: DispatchId, message: impl Into<String>) -> Self {
        Self {
            state: RouteCalcState::Error,
            error: message.into(),
            dispatch_id: dispatch.to_string(),
            stop_list: Vec::new(),
            total_distance: 0.0,
            total_hours: 0.0,
        }
    }

    /// An error with no message.
    pub fn transient(dispatch: DispatchId) -> Self {
        Self::error(dispatch, "")
    }

    pub fn classify(&self, active: Option<DispatchId>) -> Classification {
        if self.state == RouteCalcState::Ignore {
            return Classification::Ignore;
        }
        let Ok(dispatch) = DispatchId::parse(&self.dispatch_id) else {
            return Classification::Ignore;
        };
        if active != Some(dispatch) {
            return Classification::Ignore;
        }
        match self.state {
            RouteCalcState::Success => Classification::Success,
            RouteCalcState::Error if self.error.trim().is_empty() => Classification::Transient,
            RouteCalcState::Error => Classification::Terminal(self.error.clone()),
            RouteCalcState::Ignore => Classification::Ignore,
        }
    }
}

/// Last successful route, kept in the preference store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub dispatch_id: DispatchId,
    pub stop_list: Vec<StopId>,
    pub total_distance: f64,
    pub total_hours: f64,
    pub computed_at: DateTime<Utc>,
}

impl RouteSummary {
    pub fn from_result(dispatch: DispatchId, result: &RouteCalcResult, computed_at: DateTime<Utc>) -> Self {
        Self {
            dispatch_id: dispatch,
            stop_list: result.stop_list.clone(),
            total_distance: result.total_distance,
            total_hours: result.total_hours,
            computed_at,
        }
    }
}
