//! Stop checkpoints ("actions") the driver must acknowledge.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DispatchId, StopId};

/// The checkpoint an action represents.
///
/// Variants are declared in trip order, so `Ord` sorts a stop's actions
/// the way the driver passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// The vehicle is approaching the stop.
    Approach,
    /// The vehicle arrived at the stop.
    Arrive,
    /// The vehicle left the stop.
    Depart,
}

impl ActionType {
    /// All action types in trip order.
    pub const ALL: [ActionType; 3] = [ActionType::Approach, ActionType::Arrive, ActionType::Depart];

    /// Returns the upper-case name used in logs and analytics.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Approach => "APPROACH",
            ActionType::Arrive => "ARRIVE",
            ActionType::Depart => "DEPART",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint declared on a stop.
///
/// `response_sent` only ever moves from `false` to `true`; use
/// [`Action::mark_sent`] rather than assigning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub stop_id: StopId,
    pub dispatch_id: DispatchId,
    #[serde(default)]
    pub response_sent: bool,
}

impl Action {
    /// Creates a pending action.
    pub fn new(action_type: ActionType, stop_id: StopId, dispatch_id: DispatchId) -> Self {
        Self {
            action_type,
            stop_id,
            dispatch_id,
            response_sent: false,
        }
    }

    /// Marks the response as sent.
    ///
    /// Returns `true` if this call changed the action, `false` if the
    /// response had already been sent.
    pub fn mark_sent(&mut self) -> bool {
        let changed = !self.response_sent;
        self.response_sent = true;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch() -> DispatchId {
        DispatchId::parse("100").unwrap()
    }

    #[test]
    fn action_types_sort_in_trip_order() {
        let mut types = vec![ActionType::Depart, ActionType::Approach, ActionType::Arrive];
        types.sort();
        assert_eq!(types, ActionType::ALL.to_vec());
    }

    #[test]
    fn display() {
        assert_eq!(ActionType::Approach.to_string(), "APPROACH");
        assert_eq!(ActionType::Arrive.to_string(), "ARRIVE");
        assert_eq!(ActionType::Depart.to_string(), "DEPART");
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&ActionType::Arrive).unwrap();
        assert_eq!(json, "\"ARRIVE\"");
        let back: ActionType = serde_json::from_str("\"DEPART\"").unwrap();
        assert_eq!(back, ActionType::Depart);
    }

    #[test]
    fn mark_sent_is_monotonic() {
        let mut action = Action::new(ActionType::Arrive, StopId(1), dispatch());
        assert!(!action.response_sent);

        assert!(action.mark_sent());
        assert!(action.response_sent);

        // A second mark is a no-op and never reverts the flag
        assert!(!action.mark_sent());
        assert!(action.response_sent);
    }

    #[test]
    fn response_sent_defaults_to_false() {
        let json = r#"{"action_type":"APPROACH","stop_id":2,"dispatch_id":100}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert!(!action.response_sent);
        assert_eq!(action.stop_id, StopId(2));
    }
}
