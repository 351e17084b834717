//! Driver-facing messages and their ordering.

use std::cmp::Ordering;
use std::fmt;

use crate::domain::StopId;

/// Offset added to a stop id to form its arrival prompt's message id.
const ARRIVAL_PROMPT_BASE: i64 = 100_000;

/// Stable identity of a message, used for dedup, removal and dismissal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Sentinel meaning "no message".
    pub const NONE: MessageId = MessageId(-1);

    /// Id of the "did you arrive" prompt for a stop.
    ///
    /// Prompts for the same stop share an id, so a re-fired geofence
    /// replaces the queued prompt instead of adding a second one.
    pub fn arrival_prompt(stop: StopId) -> MessageId {
        MessageId(ARRIVAL_PROMPT_BASE + i64::from(stop.0))
    }

    pub fn is_none(self) -> bool {
        self == MessageId::NONE
    }

    /// Parse a persisted id. Anything unparseable is treated as no message.
    pub fn parse_or_none(s: &str) -> MessageId {
        s.trim().parse().map(MessageId).unwrap_or(MessageId::NONE)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse message category. Lower values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriorityTier(pub u8);

impl PriorityTier {
    pub const DID_YOU_ARRIVE: PriorityTier = PriorityTier(1);
    pub const COMPLETE_FORM: PriorityTier = PriorityTier(2);
    pub const SELECT_STOP: PriorityTier = PriorityTier(3);
    pub const NEXT_STOP_ADDRESS: PriorityTier = PriorityTier(4);

    /// Tiers that lower-tier messages must not interrupt.
    pub fn is_high_priority(self) -> bool {
        self <= PriorityTier::COMPLETE_FORM
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message waiting to be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub id: MessageId,
    pub text: String,
    pub tier: PriorityTier,
    /// Distance (miles) from the vehicle to the message's subject.
    pub distance: Option<f64>,
    pub stop_id: Option<StopId>,
}

impl PendingMessage {
    pub fn new(id: MessageId, text: impl Into<String>, tier: PriorityTier) -> Self {
        Self {
            id,
            text: text.into(),
            tier,
            distance: None,
            stop_id: None,
        }
    }

    /// A "did you arrive" prompt for `stop`.
    pub fn arrival_prompt(stop: StopId, text: impl Into<String>, distance: Option<f64>) -> Self {
        Self {
            id: MessageId::arrival_prompt(stop),
            text: text.into(),
            tier: PriorityTier::DID_YOU_ARRIVE,
            distance,
            stop_id: Some(stop),
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn for_stop(mut self, stop: StopId) -> Self {
        self.stop_id = Some(stop);
        self
    }

    /// Compare by urgency: `Less` means `self` should be shown first.
    ///
    /// Ordered by tier, then distance (unknown distances last), then id.
    pub fn urgency_cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| match (self.distance, other.distance) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// The message currently believed to be on the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSentMessage {
    pub id: MessageId,
    pub text: String,
    pub tier: PriorityTier,
    pub stop_id: Option<StopId>,
    /// Whether the driver has responded to it.
    pub responded: bool,
}

impl From<&PendingMessage> for LastSentMessage {
    fn from(msg: &PendingMessage) -> Self {
        Self {
            id: msg.id,
            text: msg.text.clone(),
            tier: msg.tier,
            stop_id: msg.stop_id,
            responded: false,
        }
    }
}
