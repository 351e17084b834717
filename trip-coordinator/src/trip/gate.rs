//! The stop action gate.
//!
//! Decides whether an action trigger may complete now, given the trip's
//! sequencing rules. Ordering constraints only ever apply to ARRIVE:
//! approaching or leaving a stop is always structurally allowed.
//!
//! The gate is deterministic and side-effect free. The coordinator consults
//! it for live events and before synthesizing chained departures; the
//! notification path consults it before prompting "did you arrive".

use crate::domain::{ActionType, Stop, StopId, TripType};

/// Why the gate refused an action.
///
/// The `Display` output is the human-readable reason logged for the
/// rejection. Rejections are expected under ordering races (a geofence
/// re-firing, a stale panel response) and are never surfaced as errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    /// The target stop is absent from the snapshot or logically deleted
    #[error("stop is deleted and not found")]
    StopNotFound,

    /// An arrival fired for a stop that has no ARRIVE checkpoint
    #[error("arrive triggered for a stop with no arrive action")]
    NoArriveAction,

    /// The nearest preceding sequenced stop declares no actions at all
    #[error("previous sequenced stop actions are empty")]
    PreviousActionsEmpty { previous: StopId },

    /// The nearest preceding sequenced stop still has pending actions
    #[error("{trip_type}, previous seq stop:{previous} actions are not completed")]
    PreviousIncomplete { trip_type: TripType, previous: StopId },
}

/// Evaluate whether `action` on `target` may be accepted now.
///
/// `stops` is the full stop snapshot for the dispatch, in trip order.
/// `Ok(())` means allowed (with an empty reason).
///
/// # Examples
///
/// ```
/// use trip_coordinator::domain::{ActionType, DispatchId, GeoPoint, Stop, StopId};
/// use trip_coordinator::trip::gate;
///
/// let dispatch = DispatchId::parse("1").unwrap();
/// let here = GeoPoint::new(51.5, -0.1);
/// let stops = vec![
///     Stop::new(StopId(0), "Depot", here, true).with_actions(dispatch, &[ActionType::Arrive]),
///     Stop::new(StopId(1), "Shop", here, true).with_actions(dispatch, &[ActionType::Arrive]),
/// ];
///
/// // Stop 0 hasn't been reached yet, so arriving at stop 1 is out of order
/// let err = gate::evaluate(StopId(1), ActionType::Arrive, &stops).unwrap_err();
/// assert_eq!(err.to_string(), "SEQUENTIAL, previous seq stop:0 actions are not completed");
///
/// // Departures are never ordered
/// assert!(gate::evaluate(StopId(1), ActionType::Depart, &stops).is_ok());
/// ```
pub fn evaluate(target: StopId, action: ActionType, stops: &[Stop]) -> Result<(), GateRejection> {
    let position = stops
        .iter()
        .position(|s| s.id == target && !s.deleted)
        .ok_or(GateRejection::StopNotFound)?;

    if action != ActionType::Arrive {
        return Ok(());
    }

    if !stops[position].has_action(ActionType::Arrive) {
        return Err(GateRejection::NoArriveAction);
    }

    let trip_type = TripType::resolve(stops);
    let Some(previous) = preceding_sequenced_stop(stops, position, trip_type) else {
        return Ok(());
    };

    if previous.actions.is_empty() {
        return Err(GateRejection::PreviousActionsEmpty {
            previous: previous.id,
        });
    }

    if !previous.is_complete() {
        return Err(GateRejection::PreviousIncomplete {
            trip_type,
            previous: previous.id,
        });
    }

    Ok(())
}

/// Returns true if the gate accepts the action.
pub fn is_allowed(target: StopId, action: ActionType, stops: &[Stop]) -> bool {
    evaluate(target, action, stops).is_ok()
}

/// The stop whose completion gates an arrival at `stops[position]`.
///
/// - Sequential: the immediately preceding live stop.
/// - Mixed: the nearest preceding live stop that is sequenced; free-floating
///   stops in between are skipped.
/// - Free-floating: none.
fn preceding_sequenced_stop(stops: &[Stop], position: usize, trip_type: TripType) -> Option<&Stop> {
    let mut earlier = stops[..position].iter().rev().filter(|s| !s.deleted);
    match trip_type {
        TripType::Sequential => earlier.next(),
        TripType::Mixed => earlier.find(|s| s.sequenced),
        TripType::FreeFloating => None,
    }
}
