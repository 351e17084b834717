//! Bounded, cancellable retry of route recomputation.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RouteRecalcTrigger;
use super::config::RetryConfig;
use super::engine::RouteEngine;
use super::result::{Classification, RouteSummary};
use crate::context::HostContext;
use crate::domain::DispatchId;
use crate::prefs::{PreferenceStore, PrefsError, keys, save_json};

/// How a retry run ended. `attempts` counts engine calls started.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32, summary: RouteSummary },
    /// The engine reported an error with a message.
    Failed { attempts: u32, error: String },
    /// Every attempt returned a transient error.
    Exhausted { attempts: u32 },
    /// The result was for a dispatch that is no longer active.
    Ignored { attempts: u32 },
    /// The dispatch screen is visible; retrying is left to it.
    Deferred { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Resolves once `cancel` carries `true`. Never resolves if the sender is
/// gone without cancelling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Calls the route engine until it succeeds, fails for good, or the
/// attempt budget runs out.
pub struct RouteRecalcRetryLoop<E, S> {
    engine: Arc<E>,
    prefs: Arc<S>,
    context: Arc<HostContext>,
    config: RetryConfig,
}

impl<E: RouteEngine, S: PreferenceStore> RouteRecalcRetryLoop<E, S> {
    pub fn new(engine: Arc<E>, prefs: Arc<S>, context: Arc<HostContext>, config: RetryConfig) -> Self {
        Self {
            engine,
            prefs,
            context,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run until a terminal outcome. Nothing is written once `cancel` fires.
    pub async fn run(
        &self,
        dispatch: DispatchId,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RetryOutcome, PrefsError> {
        let mut attempt = 0;
        loop {
            if *cancel.borrow() {
                return Ok(RetryOutcome::Cancelled { attempts: attempt });
            }

            let delay = self.config.delay_before(attempt + 1);
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancelled(&mut cancel) => {
                        debug!(%dispatch, attempts = attempt, "route retry cancelled during backoff");
                        return Ok(RetryOutcome::Cancelled { attempts: attempt });
                    }
                }
            }

            attempt += 1;
            let result = tokio::select! {
                result = self.engine.compute(dispatch) => result,
                _ = cancelled(&mut cancel) => {
                    debug!(%dispatch, attempts = attempt, "route retry cancelled during computation");
                    return Ok(RetryOutcome::Cancelled { attempts: attempt });
                }
            };

            let active = self
                .prefs
                .get(keys::ACTIVE_DISPATCH_ID)
                .await?
                .and_then(|raw| DispatchId::parse(&raw).ok());
            if *cancel.borrow() {
                debug!(%dispatch, attempts = attempt, "route retry cancelled before handling result");
                return Ok(RetryOutcome::Cancelled { attempts: attempt });
            }

            match result.classify(active) {
                Classification::Ignore => {
                    debug!(%dispatch, result = %result.dispatch_id, "ignoring route result");
                    return Ok(RetryOutcome::Ignored { attempts: attempt });
                }
                Classification::Success => {
                    let summary = RouteSummary::from_result(dispatch, &result, Utc::now());
                    save_json(self.prefs.as_ref(), keys::ROUTE_SUMMARY, &summary).await?;
                    info!(
                        %dispatch,
                        attempts = attempt,
                        stops = summary.stop_list.len(),
                        total_distance = summary.total_distance,
                        "route recalculated"
                    );
                    return Ok(RetryOutcome::Succeeded {
                        attempts: attempt,
                        summary,
                    });
                }
                Classification::Terminal(error) => {
                    warn!(%dispatch, attempts = attempt, %error, "route calculation failed");
                    return Ok(RetryOutcome::Failed {
                        attempts: attempt,
                        error,
                    });
                }
                Classification::Transient => {
                    if attempt >= self.config.max_attempts {
                        warn!(%dispatch, attempts = attempt, "route calculation retries exhausted");
                        return Ok(RetryOutcome::Exhausted { attempts: attempt });
                    }
                    if self.context.is_dispatch_ui_visible() {
                        debug!(%dispatch, "dispatch screen visible, not retrying");
                        return Ok(RetryOutcome::Deferred { attempts: attempt });
                    }
                    debug!(
                        %dispatch,
                        attempt,
                        next_delay_ms = self.config.delay_before(attempt + 1).as_millis() as u64,
                        "route calculation failed, retrying"
                    );
                }
            }
        }
    }
}

struct InFlight {
    cancel: watch::Sender<bool>,
    task: JoinHandle<Option<RetryOutcome>>,
}

/// Runs at most one retry loop at a time on the tokio runtime.
pub struct RouteRecalcHandle<E, S> {
    retry: Arc<RouteRecalcRetryLoop<E, S>>,
    runtime: Handle,
    in_flight: Mutex<Option<InFlight>>,
}

impl<E, S> RouteRecalcHandle<E, S>
where
    E: RouteEngine + 'static,
    S: PreferenceStore + 'static,
{
    pub fn new(retry: RouteRecalcRetryLoop<E, S>, runtime: Handle) -> Self {
        Self {
            retry: Arc::new(retry),
            runtime,
            in_flight: Mutex::new(None),
        }
    }

    fn take_in_flight(&self) -> Option<InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Wait for the current run, if any, and return how it ended.
    pub async fn join(&self) -> Option<RetryOutcome> {
        let in_flight = self.take_in_flight()?;
        in_flight.task.await.ok().flatten()
    }
}

impl<E, S> RouteRecalcTrigger for RouteRecalcHandle<E, S>
where
    E: RouteEngine + 'static,
    S: PreferenceStore + 'static,
{
    fn request_recalc(&self, dispatch: DispatchId) {
        let (cancel, cancel_rx) = watch::channel(false);
        let retry = Arc::clone(&self.retry);
        let task = self.runtime.spawn(async move {
            match retry.run(dispatch, cancel_rx).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(%dispatch, error = %e, "route retry could not access preferences");
                    None
                }
            }
        });

        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(InFlight { cancel, task });
        if let Some(previous) = previous {
            let _ = previous.cancel.send(true);
        }
    }

    fn cancel(&self) {
        if let Some(in_flight) = self.take_in_flight() {
            let _ = in_flight.cancel.send(true);
        }
    }
}
