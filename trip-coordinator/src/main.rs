//! Replays a sample trip through the coordinator.
//!
//! Loads a dispatch fixture, then drives a vehicle through it: geofence
//! arrivals raise prompts on a recording panel, the simulated driver
//! accepts them, and departures trigger route recomputation.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use trip_coordinator::cache::{CacheConfig, CachedDispatchRepository};
use trip_coordinator::context::HostContext;
use trip_coordinator::dispatch::{DispatchKey, MemoryDispatchRepository};
use trip_coordinator::domain::{
    ActionType, CustomerId, Dispatch, DispatchId, GeoPoint, StopId, VehicleId,
};
use trip_coordinator::events::TracingSink;
use trip_coordinator::notify::{PriorityNotificationScheduler, SchedulerConfig};
use trip_coordinator::panel::RecordingPanel;
use trip_coordinator::prefs::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, keys,
};
use trip_coordinator::route::{
    RetryConfig, RouteCalcResult, RouteRecalcHandle, RouteRecalcRetryLoop, ScriptedRouteEngine,
};
use trip_coordinator::trip::{EventOrigin, PromptOutcome, StopCompletionCoordinator, StopEvent};

const DEFAULT_FIXTURE: &str = "data/sample_dispatch.json";
const DEFAULT_DISPATCH_ID: &str = "4711";
const DEFAULT_RETRY_BASE_MS: u64 = 2000;
const CUSTOMER_ID: &str = "1";
const VEHICLE_ID: &str = "1";
const AVERAGE_SPEED_MPH: f64 = 18.0;

/// Demo settings read from the environment.
struct DemoConfig {
    fixture: PathBuf,
    dispatch_id: DispatchId,
    prefs_path: Option<PathBuf>,
    retry_base: Duration,
}

impl DemoConfig {
    fn from_env() -> Result<Self, Box<dyn Error>> {
        let fixture = std::env::var("TRIP_FIXTURE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_FIXTURE));
        let dispatch_id = DispatchId::parse(
            &std::env::var("TRIP_DISPATCH_ID").unwrap_or_else(|_| DEFAULT_DISPATCH_ID.to_string()),
        )?;
        let prefs_path = std::env::var("TRIP_PREFS_PATH").ok().map(PathBuf::from);
        let retry_base_ms = match std::env::var("ROUTE_RETRY_BASE_MS") {
            Ok(raw) => raw.parse()?,
            Err(_) => DEFAULT_RETRY_BASE_MS,
        };

        Ok(Self {
            fixture,
            dispatch_id,
            prefs_path,
            retry_base: Duration::from_millis(retry_base_ms),
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()),
        )
        .with_target(false)
        .init();

    let result = match DemoConfig::from_env() {
        Ok(config) => match &config.prefs_path {
            Some(path) => match FilePreferenceStore::open(path) {
                Ok(store) => run(&config, Arc::new(store)).await,
                Err(e) => Err(e.into()),
            },
            None => run(&config, Arc::new(MemoryPreferenceStore::new())).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "trip replay failed");
        std::process::exit(1);
    }
}

async fn run<S: PreferenceStore + 'static>(config: &DemoConfig, prefs: Arc<S>) -> Result<(), Box<dyn Error>> {
    let key = DispatchKey::new(
        CustomerId::parse(CUSTOMER_ID)?,
        VehicleId::parse(VEHICLE_ID)?,
        config.dispatch_id,
    );
    prefs.set(keys::CUSTOMER_ID, key.customer.to_string()).await?;
    prefs.set(keys::VEHICLE_ID, key.vehicle.to_string()).await?;
    prefs
        .set(keys::ACTIVE_DISPATCH_ID, key.dispatch.to_string())
        .await?;

    let repo = MemoryDispatchRepository::new();
    repo.load_file(key, &config.fixture).await?;
    info!(fixture = ?config.fixture, dispatch = %key, "loaded dispatch");

    // The first computation fails transiently so the retry path shows up
    // in the log; each departure then scripts the route that follows it
    let engine = Arc::new(ScriptedRouteEngine::new([RouteCalcResult::transient(
        key.dispatch,
    )]));
    let context = Arc::new(HostContext::new());
    let retry = RouteRecalcRetryLoop::new(
        Arc::clone(&engine),
        Arc::clone(&prefs),
        Arc::clone(&context),
        RetryConfig::default().with_base_delay(config.retry_base),
    );
    let route = Arc::new(RouteRecalcHandle::new(retry, Handle::current()));

    let panel = RecordingPanel::default();
    let scheduler = Arc::new(PriorityNotificationScheduler::new(
        Arc::new(panel.clone()),
        Arc::clone(&prefs),
        context,
        SchedulerConfig::default(),
    ));
    let sink = Arc::new(TracingSink);
    let coordinator = StopCompletionCoordinator::new(
        CachedDispatchRepository::new(repo.clone(), &CacheConfig::default()),
        Arc::clone(&prefs),
        scheduler,
        route.clone(),
    )
    .with_event_sink(sink.clone())
    .with_analytics_sink(sink);
    coordinator.restore().await?;

    let Some(dispatch) = repo.snapshot(&key).await else {
        return Err(format!("dispatch {key} vanished after loading").into());
    };

    // The vehicle passes close to every stop at once; only stops the gate
    // allows get a prompt
    let near: Vec<_> = dispatch
        .stops
        .iter()
        .map(|s| (s.id, nudge(s.location)))
        .collect();
    let outcomes = join_all(
        near.iter()
            .map(|(stop, at)| coordinator.on_geofence_arrival(key.dispatch, *stop, *at)),
    )
    .await;
    for ((stop, _), outcome) in near.iter().zip(outcomes) {
        let outcome = outcome?;
        info!(%stop, ?outcome, "initial geofence pass");
    }

    for stop in dispatch.stops.iter().filter(|s| !s.deleted) {
        if stop.has_action(ActionType::Approach) {
            let event = StopEvent::new(key.dispatch, stop.id, ActionType::Approach, EventOrigin::Geofence);
            coordinator.handle_stop_event(event).await?;
        }

        let prompt = match coordinator
            .on_geofence_arrival(key.dispatch, stop.id, nudge(stop.location))
            .await?
        {
            PromptOutcome::Prompted { message, .. } => message,
            PromptOutcome::Ignored | PromptOutcome::NoOp => continue,
            PromptOutcome::Rejected(reason) => {
                warn!(stop = %stop.id, %reason, "arrival not allowed yet");
                continue;
            }
        };

        let arrived = coordinator
            .on_driver_response(key.dispatch, prompt, true)
            .await?;
        info!(stop = %stop.id, outcome = ?arrived, "driver confirmed arrival");

        if stop.has_action(ActionType::Depart) {
            if let Some(current) = repo.snapshot(&key).await {
                engine.push(planned_route(&current, stop.id));
            }
            let event = StopEvent::new(key.dispatch, stop.id, ActionType::Depart, EventOrigin::Driver);
            let departed = coordinator.handle_stop_event(event).await?;
            info!(stop = %stop.id, outcome = ?departed, "driver departed");
        }

        if let Some(outcome) = route.join().await {
            info!(stop = %stop.id, ?outcome, "route recalculation finished");
        }
    }

    let finished = repo
        .snapshot(&key)
        .await
        .is_some_and(|d| d.trip_completed);
    info!(
        trip_completed = finished,
        panel_calls = panel.calls().len(),
        route_calls = engine.call_count(),
        "trip replay done"
    );
    Ok(())
}

/// Route over the stops still open once `leaving` is departed.
fn planned_route(dispatch: &Dispatch, leaving: StopId) -> RouteCalcResult {
    let remaining: Vec<StopId> = dispatch
        .awaiting_completion()
        .into_iter()
        .filter(|id| *id != leaving)
        .collect();
    let mut from = dispatch.stop(leaving).map(|s| s.location);
    let mut total_distance = 0.0;
    for stop in remaining.iter().filter_map(|id| dispatch.stop(*id)) {
        if let Some(from) = from {
            total_distance += from.distance_miles(&stop.location);
        }
        from = Some(stop.location);
    }
    RouteCalcResult::success(
        dispatch.id,
        remaining,
        total_distance,
        total_distance / AVERAGE_SPEED_MPH,
    )
}

/// A point roughly 30 metres north of `location`.
fn nudge(location: GeoPoint) -> GeoPoint {
    GeoPoint::new(location.lat + 0.0003, location.lng)
}
