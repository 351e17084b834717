//! Tests for the stop completion coordinator.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;

use super::*;
use crate::cache::{CacheConfig, CachedDispatchRepository};
use crate::context::HostContext;
use crate::dispatch::MemoryDispatchRepository;
use crate::events::{ReasonTier, RecordingSink};
use crate::notify::{EnqueueOutcome, PriorityTier, SchedulerConfig};
use crate::panel::{HostReadiness, RecordingPanel};
use crate::prefs::MemoryPreferenceStore;

type TestCoordinator =
    StopCompletionCoordinator<CachedDispatchRepository<MemoryDispatchRepository>, MemoryPreferenceStore>;

#[derive(Default)]
struct RecordingRecalc {
    requests: StdMutex<Vec<DispatchId>>,
    cancels: AtomicUsize,
}

impl RecordingRecalc {
    fn requests(&self) -> Vec<DispatchId> {
        self.requests.lock().unwrap().clone()
    }

    fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl RouteRecalcTrigger for RecordingRecalc {
    fn request_recalc(&self, dispatch: DispatchId) {
        self.requests.lock().unwrap().push(dispatch);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    coordinator: TestCoordinator,
    repo: MemoryDispatchRepository,
    prefs: Arc<MemoryPreferenceStore>,
    panel: RecordingPanel,
    sink: RecordingSink,
    route: Arc<RecordingRecalc>,
}

impl Harness {
    async fn dispatch(&self) -> Dispatch {
        self.repo.snapshot(&key()).await.unwrap()
    }

    async fn event(&self, stop: u32, action: ActionType, origin: EventOrigin) -> CompletionOutcome {
        self.coordinator
            .handle_stop_event(StopEvent::new(dispatch_id(), StopId(stop), action, origin))
            .await
            .unwrap()
    }

    async fn arrive(&self, stop: u32) -> CompletionOutcome {
        self.event(stop, ActionType::Arrive, EventOrigin::Geofence).await
    }

    async fn depart(&self, stop: u32) -> CompletionOutcome {
        self.event(stop, ActionType::Depart, EventOrigin::Driver).await
    }
}

fn dispatch_id() -> DispatchId {
    DispatchId::parse("30").unwrap()
}

fn key() -> DispatchKey {
    DispatchKey::new(
        CustomerId::parse("10").unwrap(),
        VehicleId::parse("20").unwrap(),
        dispatch_id(),
    )
}

fn location(id: u32) -> GeoPoint {
    GeoPoint::new(51.0 + f64::from(id) * 0.01, -1.0)
}

fn stop(id: u32, sequenced: bool) -> Stop {
    Stop::new(StopId(id), format!("Stop {id}"), location(id), sequenced)
        .with_actions(dispatch_id(), &[ActionType::Arrive, ActionType::Depart])
}

fn sequential(n: u32) -> Vec<Stop> {
    (0..n).map(|i| stop(i, true)).collect()
}

fn free_floating(n: u32) -> Vec<Stop> {
    (0..n).map(|i| stop(i, false)).collect()
}

async fn harness(stops: Vec<Stop>) -> Harness {
    let repo = MemoryDispatchRepository::new();
    repo.insert(key(), Dispatch::new(dispatch_id(), stops).unwrap())
        .await
        .unwrap();

    let prefs = Arc::new(MemoryPreferenceStore::new());
    for (k, v) in [
        (keys::CUSTOMER_ID, "10"),
        (keys::VEHICLE_ID, "20"),
        (keys::ACTIVE_DISPATCH_ID, "30"),
    ] {
        prefs.set(k, v.to_string()).await.unwrap();
    }

    let panel = RecordingPanel::default();
    let scheduler = Arc::new(PriorityNotificationScheduler::new(
        Arc::new(panel.clone()),
        prefs.clone(),
        Arc::new(HostContext::new()),
        SchedulerConfig::default(),
    ));
    let sink = RecordingSink::new();
    let route = Arc::new(RecordingRecalc::default());

    let coordinator = StopCompletionCoordinator::new(
        CachedDispatchRepository::new(repo.clone(), &CacheConfig::default()),
        prefs.clone(),
        scheduler,
        route.clone(),
    )
    .with_event_sink(Arc::new(sink.clone()))
    .with_analytics_sink(Arc::new(sink.clone()));

    Harness {
        coordinator,
        repo,
        prefs,
        panel,
        sink,
        route,
    }
}

fn accepted(outcome: &CompletionOutcome) -> (bool, Vec<StopId>, Option<StopId>, bool) {
    match outcome {
        CompletionOutcome::Accepted {
            stop_completed,
            auto_departed,
            current_stop,
            trip_completed,
            ..
        } => (
            *stop_completed,
            auto_departed.clone(),
            *current_stop,
            *trip_completed,
        ),
        other => panic!("expected Accepted, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_identity_is_a_no_op() {
    let h = harness(sequential(2)).await;
    h.prefs.remove(keys::VEHICLE_ID).await.unwrap();

    assert_eq!(h.arrive(0).await, CompletionOutcome::NoOp);
    assert_eq!(h.repo.fetch_count(), 0);
    assert!(h.sink.events().is_empty());
    assert!(h.sink.metrics().is_empty());
}

#[tokio::test]
async fn arrival_becomes_current_stop() {
    let h = harness(sequential(3)).await;

    let outcome = h.arrive(0).await;
    let (completed, auto_departed, current, trip_completed) = accepted(&outcome);
    assert!(!completed);
    assert!(auto_departed.is_empty());
    assert_eq!(current, Some(StopId(0)));
    assert!(!trip_completed);

    let stored = h.dispatch().await;
    assert!(stored.stops[0].is_sent(ActionType::Arrive));
    assert!(stored.stops[0].arrived_time.is_some());
    assert_eq!(h.coordinator.current_stop().await.unwrap(), Some(StopId(0)));
    assert_eq!(
        h.prefs.get(keys::IS_SEQUENCED).await.unwrap().as_deref(),
        Some("true")
    );

    assert_eq!(
        h.sink.events(),
        vec![
            WorkflowEvent::ActionCompleted {
                dispatch: dispatch_id(),
                stop: StopId(0),
                action: ActionType::Arrive,
                tier: ReasonTier::Normal,
            },
            WorkflowEvent::CurrentStopChanged {
                dispatch: dispatch_id(),
                from: None,
                to: Some(StopId(0)),
            },
        ]
    );
    assert_eq!(h.sink.metrics()[0].tier, ReasonTier::Normal);
    // Arrival is not the stop's last action
    assert!(h.route.requests().is_empty());
}

#[tokio::test]
async fn sequential_trip_rejects_out_of_order_arrival() {
    let h = harness(sequential(3)).await;

    let outcome = h.arrive(1).await;
    assert_eq!(
        outcome,
        CompletionOutcome::Rejected(GateRejection::PreviousIncomplete {
            trip_type: TripType::Sequential,
            previous: StopId(0),
        })
    );
    assert!(!h.dispatch().await.stops[1].is_sent(ActionType::Arrive));
    assert!(h.sink.events().is_empty());
    assert!(h.sink.metrics().is_empty());
    assert!(h.panel.calls().is_empty());
}

#[tokio::test]
async fn deleted_stop_is_rejected() {
    let mut stops = free_floating(2);
    stops[1].deleted = true;
    let h = harness(stops).await;

    assert_eq!(
        h.arrive(1).await,
        CompletionOutcome::Rejected(GateRejection::StopNotFound)
    );
    assert_eq!(
        h.depart(1).await,
        CompletionOutcome::Rejected(GateRejection::StopNotFound)
    );
}

#[tokio::test]
async fn undeclared_action_is_reported() {
    let h = harness(sequential(1)).await;
    assert_eq!(
        h.event(0, ActionType::Approach, EventOrigin::Geofence).await,
        CompletionOutcome::NotDeclared
    );
}

#[tokio::test]
async fn repeated_action_is_already_completed() {
    let h = harness(sequential(2)).await;
    assert!(h.arrive(0).await.is_accepted());
    let events = h.sink.events().len();

    assert_eq!(h.arrive(0).await, CompletionOutcome::AlreadyCompleted);
    assert_eq!(h.sink.events().len(), events);
    assert_eq!(h.sink.metrics().len(), 1);
}

#[tokio::test]
async fn departure_completes_stop_and_advances() {
    let h = harness(sequential(3)).await;
    h.arrive(0).await;

    let outcome = h.depart(0).await;
    let (completed, _, current, trip_completed) = accepted(&outcome);
    assert!(completed);
    assert_eq!(current, Some(StopId(1)));
    assert!(!trip_completed);

    let stored = h.dispatch().await;
    assert!(stored.stops[0].is_complete());
    assert!(stored.stops[0].completed_time.is_some());
    assert_eq!(stored.stops[0].completed_time, stored.stops[0].departed_time);

    let events = h.sink.events();
    assert!(events.contains(&WorkflowEvent::StopCompleted {
        dispatch: dispatch_id(),
        stop: StopId(0),
    }));
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::CurrentStopChanged {
            dispatch: dispatch_id(),
            from: Some(StopId(0)),
            to: Some(StopId(1)),
        })
    );
    assert_eq!(h.route.requests(), vec![dispatch_id()]);

    let awaiting: Vec<StopId> = load_json(h.prefs.as_ref(), keys::CACHED_STOP_LIST)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(awaiting, vec![StopId(1), StopId(2)]);

    // The next stop is now unblocked
    assert!(h.arrive(1).await.is_accepted());
}

#[tokio::test]
async fn current_stop_wraps_to_earlier_open_stop() {
    let h = harness(free_floating(3)).await;
    h.arrive(2).await;

    let outcome = h.depart(2).await;
    let (completed, _, current, _) = accepted(&outcome);
    assert!(completed);
    assert_eq!(current, Some(StopId(0)));
}

#[tokio::test]
async fn arrival_auto_departs_earlier_stops_exactly_once() {
    let h = harness(free_floating(3)).await;
    h.arrive(0).await;
    assert!(h.route.requests().is_empty());

    let (_, auto_departed, current, _) = accepted(&h.arrive(1).await);
    assert_eq!(auto_departed, vec![StopId(0)]);
    assert_eq!(current, Some(StopId(1)));
    // Departing stop 0 finished its last action
    assert_eq!(h.route.requests(), vec![dispatch_id()]);

    let (_, auto_departed, _, _) = accepted(&h.arrive(2).await);
    assert_eq!(auto_departed, vec![StopId(1)]);
    assert_eq!(h.route.requests(), vec![dispatch_id(), dispatch_id()]);

    let stored = h.dispatch().await;
    assert!(stored.stops[0].is_complete());
    assert!(stored.stops[1].is_complete());
    assert!(!stored.stops[2].is_complete());

    let stop0_departures = h
        .sink
        .events()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                WorkflowEvent::ActionCompleted {
                    stop: StopId(0),
                    action: ActionType::Depart,
                    ..
                }
            )
        })
        .count();
    assert_eq!(stop0_departures, 1);

    let auto_metrics: Vec<StopId> = h
        .sink
        .metrics()
        .into_iter()
        .filter(|m| m.tier == ReasonTier::Auto)
        .map(|m| m.stop)
        .collect();
    assert_eq!(auto_metrics, vec![StopId(0), StopId(1)]);
}

#[tokio::test]
async fn auto_departure_only_chains_earlier_stops() {
    let h = harness(free_floating(4)).await;
    h.arrive(0).await;
    h.arrive(3).await;

    // Stop 3 departed stop 0; arriving at 1 has nothing left to chain
    let (_, auto_departed, _, _) = accepted(&h.arrive(1).await);
    assert!(auto_departed.is_empty());
    assert!(h.dispatch().await.stops[3].is_awaiting_departure());
}

#[tokio::test]
async fn finishing_last_stop_completes_trip() {
    let h = harness(sequential(2)).await;
    h.arrive(0).await;
    h.depart(0).await;
    h.arrive(1).await;

    let outcome = h.depart(1).await;
    let (completed, _, current, trip_completed) = accepted(&outcome);
    assert!(completed);
    assert!(trip_completed);
    assert_eq!(current, None);

    assert!(h.dispatch().await.trip_completed);
    assert!(h.repo.trip_completed_at(&key()).await.is_some());
    assert_eq!(h.coordinator.current_stop().await.unwrap(), None);
    assert_eq!(
        h.sink.events().last(),
        Some(&WorkflowEvent::TripCompleted {
            dispatch: dispatch_id()
        })
    );
    // Only the first departure asked for a new route
    assert_eq!(h.route.requests(), vec![dispatch_id()]);
    assert_eq!(h.route.cancels(), 1);
}

#[tokio::test]
async fn inactive_dispatch_does_not_request_route() {
    let h = harness(sequential(2)).await;
    h.prefs
        .set(keys::ACTIVE_DISPATCH_ID, "31".to_string())
        .await
        .unwrap();

    h.arrive(0).await;
    assert!(accepted(&h.depart(0).await).0);
    assert!(h.route.requests().is_empty());
}

#[tokio::test]
async fn concurrent_arrivals_apply_once() {
    let h = harness(free_floating(2)).await;

    let outcomes = join_all((0..4).map(|_| h.arrive(1))).await;
    let applied = outcomes.iter().filter(|o| o.is_accepted()).count();
    let duplicates = outcomes
        .iter()
        .filter(|o| **o == CompletionOutcome::AlreadyCompleted)
        .count();
    assert_eq!(applied, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(h.sink.metrics().len(), 1);
}

#[tokio::test]
async fn geofence_prompts_then_driver_confirms() {
    let h = harness(free_floating(2)).await;
    let prompt = MessageId::arrival_prompt(StopId(1));

    let outcome = h
        .coordinator
        .on_geofence_arrival(dispatch_id(), StopId(1), location(1))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PromptOutcome::Prompted {
            message: prompt,
            enqueue: EnqueueOutcome::Inserted,
        }
    );
    assert_eq!(h.panel.published(), vec![prompt]);
    assert_eq!(
        h.panel.last_published_text().as_deref(),
        Some("Did you arrive at Stop 1?")
    );
    assert!(
        h.coordinator
            .triggers()
            .has_trigger_for_current_stop(StopId(1))
            .await
    );
    // Geofence alone does not complete anything
    assert!(!h.dispatch().await.stops[1].is_sent(ActionType::Arrive));

    let outcome = h
        .coordinator
        .on_driver_response(dispatch_id(), prompt, true)
        .await
        .unwrap();
    let (_, _, current, _) = accepted(&outcome);
    assert_eq!(current, Some(StopId(1)));

    assert!(h.dispatch().await.stops[1].is_sent(ActionType::Arrive));
    assert!(h.panel.dismissed().contains(&prompt));
    assert!(
        !h.coordinator
            .triggers()
            .has_trigger_for_current_stop(StopId(1))
            .await
    );
    assert!(h.coordinator.scheduler().is_empty());
    assert!(h.coordinator.scheduler().is_safe_to_respond());
    assert_eq!(h.sink.metrics()[0].tier, ReasonTier::Manual);
}

#[tokio::test]
async fn blocked_geofence_prompts_once_stop_is_unblocked() {
    let h = harness(sequential(2)).await;
    let prompt = MessageId::arrival_prompt(StopId(1));

    let outcome = h
        .coordinator
        .on_geofence_arrival(dispatch_id(), StopId(1), location(1))
        .await
        .unwrap();
    assert!(matches!(outcome, PromptOutcome::Rejected(_)));
    assert!(h.panel.calls().is_empty());
    assert!(
        h.coordinator
            .triggers()
            .has_trigger_for_current_stop(StopId(1))
            .await
    );

    // Stop 0 arrived but not departed: stop 1 is still blocked
    h.arrive(0).await;
    assert!(h.panel.published().is_empty());

    h.depart(0).await;
    assert_eq!(h.panel.published(), vec![prompt]);
    assert_eq!(
        h.panel.last_published_text().as_deref(),
        Some("Did you arrive at Stop 1?")
    );
    let queued = h.coordinator.scheduler().last_sent().await.unwrap();
    assert_eq!(queued.stop_id, Some(StopId(1)));

    let outcome = h
        .coordinator
        .on_driver_response(dispatch_id(), prompt, true)
        .await
        .unwrap();
    assert_eq!(accepted(&outcome).2, Some(StopId(1)));
    assert!(h.dispatch().await.stops[1].is_sent(ActionType::Arrive));
}

#[tokio::test]
async fn accepting_non_arrival_message_completes_nothing() {
    let h = harness(free_floating(3)).await;
    let form = MessageId(100_002);
    h.coordinator
        .scheduler()
        .enqueue(PendingMessage::new(
            form,
            "Complete the delivery form",
            PriorityTier::COMPLETE_FORM,
        ))
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .on_driver_response(dispatch_id(), form, true)
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::NoOp);
    assert!(!h.dispatch().await.stops[2].is_sent(ActionType::Arrive));
    assert!(h.panel.dismissed().contains(&form));
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn rejected_event_does_not_publish() {
    let h = harness(sequential(2)).await;
    h.panel.set_readiness(HostReadiness::ServiceConnected);
    let outcome = h
        .coordinator
        .on_geofence_arrival(dispatch_id(), StopId(0), location(0))
        .await
        .unwrap();
    assert!(matches!(outcome, PromptOutcome::Prompted { .. }));
    assert!(h.panel.calls().is_empty());

    h.panel.set_readiness(HostReadiness::ReadyToProcess);
    assert!(matches!(h.arrive(1).await, CompletionOutcome::Rejected(_)));
    assert_eq!(
        h.event(0, ActionType::Approach, EventOrigin::Geofence).await,
        CompletionOutcome::NotDeclared
    );

    assert!(h.panel.calls().is_empty());
    assert!(!h.prefs.contains(keys::LAST_SENT_MESSAGE_ID).await.unwrap());
    assert!(h.coordinator.scheduler().last_sent().await.is_none());
}

#[tokio::test]
async fn geofence_after_arrival_is_ignored() {
    let h = harness(sequential(2)).await;
    h.arrive(0).await;

    let outcome = h
        .coordinator
        .on_geofence_arrival(dispatch_id(), StopId(0), location(0))
        .await
        .unwrap();
    assert_eq!(outcome, PromptOutcome::Ignored);
    assert!(h.panel.calls().is_empty());
}

#[tokio::test]
async fn declined_prompt_changes_nothing() {
    let h = harness(sequential(2)).await;
    let prompt = MessageId::arrival_prompt(StopId(0));
    h.coordinator
        .on_geofence_arrival(dispatch_id(), StopId(0), location(0))
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .on_driver_response(dispatch_id(), prompt, false)
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::Declined);
    assert!(!h.dispatch().await.stops[0].is_sent(ActionType::Arrive));
    assert!(h.panel.dismissed().contains(&prompt));
    assert!(
        !h.coordinator
            .triggers()
            .has_trigger_for_current_stop(StopId(0))
            .await
    );
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn response_while_another_is_processed_is_ignored() {
    let h = harness(sequential(2)).await;
    let prompt = MessageId::arrival_prompt(StopId(0));

    let window = h.coordinator.scheduler().begin_response().unwrap();
    let outcome = h
        .coordinator
        .on_driver_response(dispatch_id(), prompt, true)
        .await
        .unwrap();
    assert_eq!(outcome, CompletionOutcome::NoOp);
    drop(window);

    assert!(!h.dispatch().await.stops[0].is_sent(ActionType::Arrive));
}

#[tokio::test]
async fn arrival_withdraws_queued_prompt() {
    let h = harness(free_floating(2)).await;
    let prompt = MessageId::arrival_prompt(StopId(0));
    h.coordinator
        .on_geofence_arrival(dispatch_id(), StopId(0), location(0))
        .await
        .unwrap();

    // Arrival reported directly, without answering the prompt
    h.arrive(0).await;

    assert!(!h.coordinator.scheduler().contains(prompt));
    assert!(h.panel.dismissed().contains(&prompt));
    assert!(h.coordinator.scheduler().last_sent().await.is_none());
}

#[tokio::test]
async fn restore_cleans_up_previous_process() {
    let h = harness(sequential(2)).await;
    h.coordinator
        .on_geofence_arrival(dispatch_id(), StopId(1), location(1))
        .await
        .unwrap();
    h.prefs
        .set(keys::LAST_SENT_MESSAGE_ID, "77".to_string())
        .await
        .unwrap();

    let panel = RecordingPanel::default();
    let scheduler = Arc::new(PriorityNotificationScheduler::new(
        Arc::new(panel.clone()),
        h.prefs.clone(),
        Arc::new(HostContext::new()),
        SchedulerConfig::default(),
    ));
    let restarted: TestCoordinator = StopCompletionCoordinator::new(
        CachedDispatchRepository::new(h.repo.clone(), &CacheConfig::default()),
        h.prefs.clone(),
        scheduler,
        h.route.clone(),
    );
    restarted.restore().await.unwrap();

    assert_eq!(panel.dismissed(), vec![MessageId(77)]);
    assert!(
        restarted
            .triggers()
            .has_trigger_for_current_stop(StopId(1))
            .await
    );
}
