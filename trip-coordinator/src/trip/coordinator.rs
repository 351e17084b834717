//! Applies stop events to the active dispatch.
//!
//! Every event runs through the same steps under one critical section:
//! gate the action, chain automatic departures, record the action, then
//! settle everything that depends on stop state (current stop, arrival
//! triggers, queued prompts, route recomputation and trip completion).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::gate::{self, GateRejection};
use super::outcome::{CompletionOutcome, CoordinatorError, EventOrigin, PromptOutcome, StopEvent};
use super::triggers::{ArrivalTrigger, ArrivalTriggerStore};
use crate::dispatch::{DispatchKey, DispatchRepository};
use crate::domain::{
    ActionType, CustomerId, Dispatch, DispatchId, DomainError, GeoPoint, Stop, StopId,
    StopProgress, TripType, VehicleId,
};
use crate::events::{ActionMetric, AnalyticsSink, TracingSink, WorkflowEvent, WorkflowEventSink};
use crate::notify::{MessageId, PendingMessage, PriorityNotificationScheduler};
use crate::prefs::{PreferenceStore, PrefsError, keys, load_json, save_json};
use crate::route::RouteRecalcTrigger;

/// Single entry point for geofence arrivals, driver responses and direct
/// stop events.
pub struct StopCompletionCoordinator<R, S> {
    repository: R,
    prefs: Arc<S>,
    scheduler: Arc<PriorityNotificationScheduler<S>>,
    triggers: ArrivalTriggerStore<S>,
    route: Arc<dyn RouteRecalcTrigger>,
    events: Arc<dyn WorkflowEventSink>,
    analytics: Arc<dyn AnalyticsSink>,
    critical: Mutex<()>,
}

impl<R: DispatchRepository, S: PreferenceStore> StopCompletionCoordinator<R, S> {
    /// Create a coordinator that reports events and metrics to the log.
    pub fn new(
        repository: R,
        prefs: Arc<S>,
        scheduler: Arc<PriorityNotificationScheduler<S>>,
        route: Arc<dyn RouteRecalcTrigger>,
    ) -> Self {
        Self {
            repository,
            triggers: ArrivalTriggerStore::new(Arc::clone(&prefs)),
            prefs,
            scheduler,
            route,
            events: Arc::new(TracingSink),
            analytics: Arc::new(TracingSink),
            critical: Mutex::new(()),
        }
    }

    /// Send workflow events somewhere other than the log.
    pub fn with_event_sink(mut self, events: Arc<dyn WorkflowEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Send action metrics somewhere other than the log.
    pub fn with_analytics_sink(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn scheduler(&self) -> &Arc<PriorityNotificationScheduler<S>> {
        &self.scheduler
    }

    pub fn triggers(&self) -> &ArrivalTriggerStore<S> {
        &self.triggers
    }

    /// Reload persisted triggers and clean up a panel message left by a
    /// previous process.
    pub async fn restore(&self) -> Result<(), CoordinatorError> {
        let triggers = self.triggers.load().await?;
        self.scheduler.restore().await?;
        debug!(triggers, "restored coordinator state");
        Ok(())
    }

    /// The tracked current stop.
    pub async fn current_stop(&self) -> Result<Option<StopId>, CoordinatorError> {
        Ok(load_json(self.prefs.as_ref(), keys::CURRENT_STOP).await?)
    }

    /// Complete one action at one stop.
    pub async fn handle_stop_event(&self, event: StopEvent) -> Result<CompletionOutcome, CoordinatorError> {
        let outcome = {
            let _critical = self.critical.lock().await;
            self.complete(event).await?
        };
        if outcome.is_accepted() {
            self.scheduler.publish_next().await?;
        }
        Ok(outcome)
    }

    /// The vehicle entered a stop's geofence: remember it and ask the
    /// driver to confirm the arrival.
    pub async fn on_geofence_arrival(
        &self,
        dispatch_id: DispatchId,
        stop_id: StopId,
        location: GeoPoint,
    ) -> Result<PromptOutcome, CoordinatorError> {
        let _critical = self.critical.lock().await;
        let Some(key) = self.dispatch_key(dispatch_id).await? else {
            debug!(dispatch = %dispatch_id, "vehicle identity not configured, ignoring geofence");
            return Ok(PromptOutcome::NoOp);
        };
        let dispatch = self.repository.fetch_dispatch(&key).await?;
        let Some(stop) = dispatch.stop(stop_id).filter(|s| !s.deleted) else {
            debug!(stop = %stop_id, "geofence for unknown or deleted stop");
            return Ok(PromptOutcome::Ignored);
        };
        if stop.is_sent(ActionType::Arrive) {
            debug!(stop = %stop_id, "geofence for stop already arrived at");
            return Ok(PromptOutcome::Ignored);
        }

        self.triggers.put(stop_id, location, Utc::now()).await?;

        if let Err(rejection) = gate::evaluate(stop_id, ActionType::Arrive, &dispatch.stops) {
            debug!(stop = %stop_id, reason = %rejection, "not prompting for arrival");
            return Ok(PromptOutcome::Rejected(rejection));
        }

        let prompt = self.arrival_prompt(stop, location);
        let message = prompt.id;
        let distance = prompt.distance;
        let enqueue = self.scheduler.enqueue(prompt).await?;

        debug!(stop = %stop_id, %message, ?distance, ?enqueue, "arrival prompt queued");
        Ok(PromptOutcome::Prompted { message, enqueue })
    }

    /// The driver answered a panel message.
    ///
    /// Accepting an arrival prompt completes that stop's ARRIVE. Responses
    /// that arrive while another is still being processed are ignored.
    pub async fn on_driver_response(
        &self,
        dispatch_id: DispatchId,
        message: MessageId,
        accepted: bool,
    ) -> Result<CompletionOutcome, CoordinatorError> {
        let Some(window) = self.scheduler.begin_response() else {
            debug!(%message, "driver response already in progress");
            return Ok(CompletionOutcome::NoOp);
        };

        let prompt_stop = self.scheduler.arrival_prompt_stop(message).await;
        self.scheduler.mark_responded(message).await;
        self.scheduler.remove_by_id(message);

        let outcome = match prompt_stop {
            Some(stop) => {
                self.triggers.remove(stop).await?;
                if accepted {
                    let _critical = self.critical.lock().await;
                    let event = StopEvent::new(dispatch_id, stop, ActionType::Arrive, EventOrigin::Driver);
                    self.complete(event).await?
                } else {
                    debug!(stop = %stop, "driver declined arrival");
                    CompletionOutcome::Declined
                }
            }
            None => CompletionOutcome::NoOp,
        };

        self.scheduler.dismiss(message).await?;
        drop(window);
        self.scheduler.publish_next().await?;
        Ok(outcome)
    }

    async fn dispatch_key(&self, dispatch: DispatchId) -> Result<Option<DispatchKey>, PrefsError> {
        let customer = self
            .prefs
            .get(keys::CUSTOMER_ID)
            .await?
            .and_then(|raw| CustomerId::parse(&raw).ok());
        let vehicle = self
            .prefs
            .get(keys::VEHICLE_ID)
            .await?
            .and_then(|raw| VehicleId::parse(&raw).ok());
        Ok(customer
            .zip(vehicle)
            .map(|(customer, vehicle)| DispatchKey::new(customer, vehicle, dispatch)))
    }

    /// Must be called inside the critical section.
    async fn complete(&self, event: StopEvent) -> Result<CompletionOutcome, CoordinatorError> {
        let Some(key) = self.dispatch_key(event.dispatch_id).await? else {
            debug!(dispatch = %event.dispatch_id, "vehicle identity not configured, ignoring stop event");
            return Ok(CompletionOutcome::NoOp);
        };
        let mut dispatch = self.repository.fetch_dispatch(&key).await?;

        if let Err(rejection) = gate::evaluate(event.stop_id, event.action, &dispatch.stops) {
            debug!(
                stop = %event.stop_id,
                action = %event.action,
                reason = %rejection,
                "stop event rejected"
            );
            return Ok(CompletionOutcome::Rejected(rejection));
        }
        let Some(target) = dispatch.stop(event.stop_id) else {
            return Ok(CompletionOutcome::Rejected(GateRejection::StopNotFound));
        };
        if !target.has_action(event.action) {
            debug!(stop = %event.stop_id, action = %event.action, "stop does not declare action");
            return Ok(CompletionOutcome::NotDeclared);
        }
        if target.is_sent(event.action) {
            debug!(stop = %event.stop_id, action = %event.action, "action already completed");
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        let is_last_action = target.last_action_type() == Some(event.action);

        let now = Utc::now();
        self.record_metric(dispatch.id, event.stop_id, event.action, event.origin);

        let mut completed = Vec::new();
        let mut auto_departed = Vec::new();
        let mut route_changed = is_last_action;
        if event.action == ActionType::Arrive {
            for stop in departures_to_chain(&dispatch, event.stop_id) {
                self.record_metric(dispatch.id, stop, ActionType::Depart, EventOrigin::System);
                if self
                    .apply(&key, &mut dispatch, stop, ActionType::Depart, EventOrigin::System, now)
                    .await?
                {
                    completed.push(stop);
                }
                route_changed |= dispatch
                    .stop(stop)
                    .is_some_and(|s| s.last_action_type() == Some(ActionType::Depart));
                auto_departed.push(stop);
            }
        }

        let stop_completed = self
            .apply(&key, &mut dispatch, event.stop_id, event.action, event.origin, now)
            .await?;
        if stop_completed {
            completed.push(event.stop_id);
        }

        save_json(
            self.prefs.as_ref(),
            keys::CACHED_STOP_LIST,
            &dispatch.awaiting_completion(),
        )
        .await?;
        self.prefs
            .set(
                keys::IS_SEQUENCED,
                (dispatch.trip_type() == TripType::Sequential).to_string(),
            )
            .await?;

        let mut settled = completed.clone();
        if event.action == ActionType::Arrive {
            self.triggers.remove(event.stop_id).await?;
            if !settled.contains(&event.stop_id) {
                settled.push(event.stop_id);
            }
        }
        let unacknowledged = self.triggers.list_unacknowledged(&dispatch.stops).await?;
        self.scheduler.invalidate_by_stop_id(&settled).await?;

        let mut current_stop = self.advance_current_stop(&dispatch, &event, &completed).await?;

        let trip_completed = dispatch.all_stops_complete() && !dispatch.trip_completed;
        if trip_completed {
            self.complete_trip(&key, &mut dispatch, current_stop, now)
                .await?;
            current_stop = None;
        } else {
            self.prompt_unblocked_arrivals(&dispatch, &unacknowledged)
                .await?;
            if route_changed && self.is_active(dispatch.id).await? {
                debug!(dispatch = %dispatch.id, stop = %event.stop_id, "requesting route recalculation");
                self.route.request_recalc(dispatch.id);
            }
        }

        Ok(CompletionOutcome::Accepted {
            stop: event.stop_id,
            stop_completed,
            auto_departed,
            current_stop,
            trip_completed: dispatch.trip_completed,
        })
    }

    fn arrival_prompt(&self, stop: &Stop, captured_at: GeoPoint) -> PendingMessage {
        let text = self.scheduler.config().arrival_prompt_text(&stop.name);
        let distance = captured_at.distance_miles(&stop.location);
        PendingMessage::arrival_prompt(stop.id, text, Some(distance))
    }

    /// Queue prompts for stored geofence arrivals the gate now allows.
    async fn prompt_unblocked_arrivals(
        &self,
        dispatch: &Dispatch,
        triggers: &[ArrivalTrigger],
    ) -> Result<(), CoordinatorError> {
        for trigger in triggers {
            let Some(stop) = dispatch.stop(trigger.stop_id) else {
                continue;
            };
            if stop.is_sent(ActionType::Arrive)
                || !gate::is_allowed(stop.id, ActionType::Arrive, &dispatch.stops)
            {
                continue;
            }
            let enqueue = self
                .scheduler
                .enqueue(self.arrival_prompt(stop, trigger.location))
                .await?;
            debug!(stop = %stop.id, ?enqueue, "stored arrival now allowed, prompting");
        }
        Ok(())
    }

    /// Record one action and persist its stop. Returns true if the stop
    /// became complete.
    async fn apply(
        &self,
        key: &DispatchKey,
        dispatch: &mut Dispatch,
        stop_id: StopId,
        action: ActionType,
        origin: EventOrigin,
        at: DateTime<Utc>,
    ) -> Result<bool, CoordinatorError> {
        let stop = dispatch
            .stop_mut(stop_id)
            .ok_or(DomainError::StopNotFound(stop_id))?;
        let progress = stop.record(action, at)?;
        if progress == StopProgress::AlreadySent {
            return Ok(false);
        }
        self.repository.save_stop(key, stop).await?;

        self.events.emit(WorkflowEvent::ActionCompleted {
            dispatch: key.dispatch,
            stop: stop_id,
            action,
            tier: origin.reason_tier(),
        });
        let completed = progress == StopProgress::Completed;
        if completed {
            self.events.emit(WorkflowEvent::StopCompleted {
                dispatch: key.dispatch,
                stop: stop_id,
            });
        }

        debug!(stop = %stop_id, %action, ?origin, completed, "action recorded");
        Ok(completed)
    }

    fn record_metric(&self, dispatch: DispatchId, stop: StopId, action: ActionType, origin: EventOrigin) {
        self.analytics.record(ActionMetric {
            dispatch,
            stop,
            action,
            tier: origin.reason_tier(),
        });
    }

    async fn advance_current_stop(
        &self,
        dispatch: &Dispatch,
        event: &StopEvent,
        completed: &[StopId],
    ) -> Result<Option<StopId>, CoordinatorError> {
        let previous = self.current_stop().await?;
        let mut next = previous;
        if event.action == ActionType::Arrive {
            next = Some(event.stop_id);
        }
        if let Some(current) = next
            && completed.contains(&current)
        {
            next = dispatch.next_open_stop(current);
        }

        if next != previous {
            self.set_current_stop(dispatch.id, previous, next).await?;
        }
        Ok(next)
    }

    async fn set_current_stop(
        &self,
        dispatch: DispatchId,
        from: Option<StopId>,
        to: Option<StopId>,
    ) -> Result<(), PrefsError> {
        match to {
            Some(stop) => save_json(self.prefs.as_ref(), keys::CURRENT_STOP, &stop).await?,
            None => self.prefs.remove(keys::CURRENT_STOP).await?,
        }
        info!(%dispatch, ?from, ?to, "current stop changed");
        self.events
            .emit(WorkflowEvent::CurrentStopChanged { dispatch, from, to });
        Ok(())
    }

    async fn complete_trip(
        &self,
        key: &DispatchKey,
        dispatch: &mut Dispatch,
        current_stop: Option<StopId>,
        at: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.repository.mark_trip_completed(key, at).await?;
        dispatch.trip_completed = true;
        if current_stop.is_some() {
            self.set_current_stop(dispatch.id, current_stop, None).await?;
        }
        self.route.cancel();
        self.events
            .emit(WorkflowEvent::TripCompleted { dispatch: dispatch.id });
        info!(dispatch = %dispatch.id, "trip completed");
        Ok(())
    }

    /// Returns true if `dispatch` is the one the driver is working.
    async fn is_active(&self, dispatch: DispatchId) -> Result<bool, PrefsError> {
        Ok(self
            .prefs
            .get(keys::ACTIVE_DISPATCH_ID)
            .await?
            .and_then(|raw| DispatchId::parse(&raw).ok())
            == Some(dispatch))
    }
}

/// Stops before `target` that were arrived at but never departed.
fn departures_to_chain(dispatch: &Dispatch, target: StopId) -> Vec<StopId> {
    let Some(position) = dispatch.position(target) else {
        return Vec::new();
    };
    dispatch.stops[..position]
        .iter()
        .filter(|s| !s.deleted && s.is_awaiting_departure())
        .filter(|s| gate::is_allowed(s.id, ActionType::Depart, &dispatch.stops))
        .map(|s| s.id)
        .collect()
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
