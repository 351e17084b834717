//! Stops, their locations, and the dispatch that orders them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{Action, ActionType, DispatchId, StopId, TripType};

/// Mean Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle (haversine) distance to `other`, in miles.
    pub fn distance_miles(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
    }
}

/// What recording an action did to its stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopProgress {
    /// The action had already been sent; nothing changed.
    AlreadySent,
    /// The action was sent but other declared actions are still pending.
    Sent,
    /// The action was the last pending one; the stop is now complete.
    Completed,
}

/// A stop on a dispatch.
///
/// A stop declares zero or one [`Action`] of each [`ActionType`]. It is
/// complete once every declared action has been sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub sequenced: bool,
    #[serde(default)]
    pub deleted: bool,
    pub location: GeoPoint,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub arrived_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub departed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_time: Option<DateTime<Utc>>,
}

impl Stop {
    /// Creates a stop with no actions.
    pub fn new(id: StopId, name: impl Into<String>, location: GeoPoint, sequenced: bool) -> Self {
        Self {
            id,
            name: name.into(),
            address: String::new(),
            sequenced,
            deleted: false,
            location,
            actions: Vec::new(),
            arrived_time: None,
            departed_time: None,
            completed_time: None,
        }
    }

    /// Declares pending actions of the given types, in trip order.
    pub fn with_actions(mut self, dispatch_id: DispatchId, types: &[ActionType]) -> Self {
        let mut types = types.to_vec();
        types.sort();
        types.dedup();
        self.actions = types
            .into_iter()
            .map(|t| Action::new(t, self.id, dispatch_id))
            .collect();
        self
    }

    /// Sets the display address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Returns the declared action of the given type.
    pub fn action(&self, action_type: ActionType) -> Option<&Action> {
        self.actions.iter().find(|a| a.action_type == action_type)
    }

    /// Returns true if the stop declares an action of this type.
    pub fn has_action(&self, action_type: ActionType) -> bool {
        self.action(action_type).is_some()
    }

    /// Returns true if an action of this type is declared and already sent.
    pub fn is_sent(&self, action_type: ActionType) -> bool {
        self.action(action_type).is_some_and(|a| a.response_sent)
    }

    /// Returns true if an action of this type is declared and still pending.
    pub fn is_pending(&self, action_type: ActionType) -> bool {
        self.action(action_type).is_some_and(|a| !a.response_sent)
    }

    /// Returns true if every declared action has been sent.
    ///
    /// A stop that declares no actions is vacuously complete.
    pub fn is_complete(&self) -> bool {
        self.actions.iter().all(|a| a.response_sent)
    }

    /// Returns true if the driver arrived but has not yet departed.
    pub fn is_awaiting_departure(&self) -> bool {
        self.is_sent(ActionType::Arrive) && self.is_pending(ActionType::Depart)
    }

    /// The type of the final action this stop declares.
    pub fn last_action_type(&self) -> Option<ActionType> {
        self.actions.iter().map(|a| a.action_type).max()
    }

    /// Records an action response at `at`.
    ///
    /// Sets the matching arrival/departure timestamp and, when this was the
    /// last pending action, `completed_time`. `completed_time` is only ever
    /// set once.
    pub fn record(
        &mut self,
        action_type: ActionType,
        at: DateTime<Utc>,
    ) -> Result<StopProgress, DomainError> {
        let stop_id = self.id;
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.action_type == action_type)
            .ok_or(DomainError::ActionNotDeclared {
                stop: stop_id,
                action: action_type,
            })?;

        if !action.mark_sent() {
            return Ok(StopProgress::AlreadySent);
        }

        match action_type {
            ActionType::Arrive => self.arrived_time = Some(at),
            ActionType::Depart => self.departed_time = Some(at),
            ActionType::Approach => {}
        }

        if self.is_complete() && self.completed_time.is_none() {
            self.completed_time = Some(at);
            return Ok(StopProgress::Completed);
        }

        Ok(StopProgress::Sent)
    }
}

/// A dispatch: one trip's ordered stop list.
///
/// The order of `stops` is the trip order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: DispatchId,
    #[serde(default)]
    pub trip_completed: bool,
    pub stops: Vec<Stop>,
}

impl Dispatch {
    /// Creates a dispatch, validating its stops.
    pub fn new(id: DispatchId, stops: Vec<Stop>) -> Result<Self, DomainError> {
        let dispatch = Self {
            id,
            trip_completed: false,
            stops,
        };
        dispatch.validate()?;
        Ok(dispatch)
    }

    /// Checks stop ids are unique and every action belongs to its stop,
    /// with at most one action of each type.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for stop in &self.stops {
            if !seen.insert(stop.id) {
                return Err(DomainError::DuplicateStop(stop.id));
            }
            let mut types = HashSet::new();
            for action in &stop.actions {
                if action.stop_id != stop.id || action.dispatch_id != self.id {
                    return Err(DomainError::MismatchedAction(stop.id));
                }
                if !types.insert(action.action_type) {
                    return Err(DomainError::DuplicateAction {
                        stop: stop.id,
                        action: action.action_type,
                    });
                }
            }
        }
        Ok(())
    }

    /// Derives the trip type from the current stop list.
    pub fn trip_type(&self) -> TripType {
        TripType::resolve(&self.stops)
    }

    /// Position of a stop in trip order.
    pub fn position(&self, id: StopId) -> Option<usize> {
        self.stops.iter().position(|s| s.id == id)
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    pub fn stop_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.stops.iter_mut().find(|s| s.id == id)
    }

    /// Non-deleted stops that are not yet complete, in trip order.
    pub fn awaiting_completion(&self) -> Vec<StopId> {
        self.stops
            .iter()
            .filter(|s| !s.deleted && !s.is_complete())
            .map(|s| s.id)
            .collect()
    }

    /// Returns true once every non-deleted stop is complete.
    pub fn all_stops_complete(&self) -> bool {
        self.stops.iter().filter(|s| !s.deleted).all(Stop::is_complete)
    }

    /// The stop to make current after `after` completes.
    ///
    /// Searches forward in trip order for a stop that is neither complete
    /// nor deleted, then wraps around to the start of the trip.
    pub fn next_open_stop(&self, after: StopId) -> Option<StopId> {
        let start = self.position(after).map_or(0, |p| p + 1);
        let open = |s: &&Stop| !s.deleted && !s.is_complete() && s.id != after;
        self.stops[start.min(self.stops.len())..]
            .iter()
            .chain(self.stops.iter())
            .find(open)
            .map(|s| s.id)
    }
}
