//! The authoritative dispatch document store.
//!
//! Stops, their actions and the dispatch's trip-completed flag live in a
//! remote document store keyed by (customer, vehicle, dispatch). The
//! coordinator reads through [`crate::cache::CachedDispatchRepository`]
//! and writes completion timestamps back through the same interface.

mod error;
mod memory;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{CustomerId, Dispatch, DispatchId, Stop, VehicleId};

pub use error::DispatchError;
pub use memory::MemoryDispatchRepository;

/// Full identity of a dispatch document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub customer: CustomerId,
    pub vehicle: VehicleId,
    pub dispatch: DispatchId,
}

impl DispatchKey {
    pub fn new(customer: CustomerId, vehicle: VehicleId, dispatch: DispatchId) -> Self {
        Self {
            customer,
            vehicle,
            dispatch,
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.customer, self.vehicle, self.dispatch)
    }
}

/// Trait for the dispatch document store.
///
/// This abstraction allows the coordinator to be tested with in-memory
/// documents.
pub trait DispatchRepository: Send + Sync {
    /// Fetch a dispatch with its stops in trip order.
    fn fetch_dispatch(
        &self,
        key: &DispatchKey,
    ) -> impl Future<Output = Result<Dispatch, DispatchError>> + Send;

    /// Write a stop's action flags and timestamps.
    fn save_stop(
        &self,
        key: &DispatchKey,
        stop: &Stop,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;

    /// Set the dispatch's trip-completed flag.
    fn mark_trip_completed(
        &self,
        key: &DispatchKey,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}
