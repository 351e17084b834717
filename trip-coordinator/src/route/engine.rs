//! Route engine abstraction and a scripted implementation.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::result::RouteCalcResult;
use crate::domain::DispatchId;

/// Computes an optimized route for a dispatch.
pub trait RouteEngine: Send + Sync {
    fn compute(&self, dispatch: DispatchId) -> impl Future<Output = RouteCalcResult> + Send;
}

#[derive(Debug, Default)]
struct Script {
    results: VecDeque<RouteCalcResult>,
    calls: Vec<Instant>,
}

/// Engine that replays a fixed sequence of results.
///
/// Once the script runs out every call returns a transient error for the
/// requested dispatch. Clones share the script and the call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRouteEngine {
    script: Arc<Mutex<Script>>,
    latency: Duration,
}

impl ScriptedRouteEngine {
    pub fn new(results: impl IntoIterator<Item = RouteCalcResult>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                results: results.into_iter().collect(),
                calls: Vec::new(),
            })),
            latency: Duration::ZERO,
        }
    }

    /// Make every call take `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Append a result to the script.
    pub fn push(&self, result: RouteCalcResult) {
        self.lock().results.push_back(result);
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// When each call started.
    pub fn call_times(&self) -> Vec<Instant> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RouteEngine for ScriptedRouteEngine {
    async fn compute(&self, dispatch: DispatchId) -> RouteCalcResult {
        let next = {
            let mut script = self.lock();
            script.calls.push(Instant::now());
            script.results.pop_front()
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        next.unwrap_or_else(|| RouteCalcResult::transient(dispatch))
    }
}
