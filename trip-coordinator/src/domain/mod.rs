//! Domain types for the trip coordinator.
//!
//! Stops, their checkpoints and the dispatch that orders them. Identifier
//! types enforce their invariants at construction time, so code that
//! receives them can trust their validity.

mod action;
mod error;
mod ids;
mod stop;
mod trip_type;

pub use action::{Action, ActionType};
pub use error::DomainError;
pub use ids::{CustomerId, DispatchId, InvalidId, StopId, VehicleId};
pub use stop::{Dispatch, GeoPoint, Stop, StopProgress};
pub use trip_type::TripType;
