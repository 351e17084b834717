//! Stop completion and driver notification for a delivery vehicle.
//!
//! Answers two questions for the trip in progress: "may this stop action
//! complete now, and what follows from it?" and "which single message
//! should the driver see right now?"

pub mod cache;
pub mod context;
pub mod dispatch;
pub mod domain;
pub mod events;
pub mod notify;
pub mod panel;
pub mod prefs;
pub mod route;
pub mod trip;
