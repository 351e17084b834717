//! Workflow events and analytics emitted by the coordinator.
//!
//! Both sinks are fire-and-forget: implementations must return quickly and
//! never fail back into the coordinator.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::domain::{ActionType, DispatchId, StopId};

/// Why an action completed, for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonTier {
    /// Synthesized by the system (auto-depart chaining).
    Auto,
    /// Acknowledged by the driver.
    Manual,
    /// Triggered by geofencing.
    Normal,
}

impl ReasonTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonTier::Auto => "AUTO",
            ReasonTier::Manual => "MANUAL",
            ReasonTier::Normal => "NORMAL",
        }
    }
}

/// Metric recorded for every accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMetric {
    pub dispatch: DispatchId,
    pub stop: StopId,
    pub action: ActionType,
    pub tier: ReasonTier,
}

/// State changes reported to the host's workflow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    ActionCompleted {
        dispatch: DispatchId,
        stop: StopId,
        action: ActionType,
        tier: ReasonTier,
    },
    StopCompleted {
        dispatch: DispatchId,
        stop: StopId,
    },
    CurrentStopChanged {
        dispatch: DispatchId,
        from: Option<StopId>,
        to: Option<StopId>,
    },
    TripCompleted {
        dispatch: DispatchId,
    },
}

/// Receives workflow events.
pub trait WorkflowEventSink: Send + Sync {
    fn emit(&self, event: WorkflowEvent);
}

/// Receives analytics metrics.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, metric: ActionMetric);
}

/// Sink that writes events and metrics to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl WorkflowEventSink for TracingSink {
    fn emit(&self, event: WorkflowEvent) {
        info!(?event, "workflow event");
    }
}

impl AnalyticsSink for TracingSink {
    fn record(&self, metric: ActionMetric) {
        info!(
            dispatch = %metric.dispatch,
            stop = %metric.stop,
            action = %metric.action,
            tier = metric.tier.as_str(),
            "action metric"
        );
    }
}

/// Sink that keeps everything it receives. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
    metrics: Arc<Mutex<Vec<ActionMetric>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn metrics(&self) -> Vec<ActionMetric> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WorkflowEventSink for RecordingSink {
    fn emit(&self, event: WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl AnalyticsSink for RecordingSink {
    fn record(&self, metric: ActionMetric) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric);
    }
}
