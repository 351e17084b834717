//! Keys the coordinator, scheduler and retry loop store values under.

/// Customer account that owns the vehicle.
pub const CUSTOMER_ID: &str = "customer_id";

/// The vehicle this process runs on.
pub const VEHICLE_ID: &str = "vehicle_id";

/// The dispatch the driver is currently working.
pub const ACTIVE_DISPATCH_ID: &str = "active_dispatch_id";

/// The tracked current stop.
pub const CURRENT_STOP: &str = "current_stop";

/// Unacknowledged arrival triggers.
pub const ARRIVED_TRIGGERS: &str = "arrived_triggers";

/// Whether the active trip is sequential.
pub const IS_SEQUENCED: &str = "is_sequenced";

/// Id of the message last published to the panel.
pub const LAST_SENT_MESSAGE_ID: &str = "last_sent_message_id";

/// Stops awaiting completion, for quick redisplay.
pub const CACHED_STOP_LIST: &str = "cached_stop_list";

/// Summary of the last successful route computation.
pub const ROUTE_SUMMARY: &str = "route_summary";
