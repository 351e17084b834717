//! Trip-type classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Stop;

/// How a dispatch constrains the order in which its stops are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    /// Every stop must be visited in trip order.
    Sequential,
    /// Stops may be visited in any order.
    FreeFloating,
    /// Sequenced stops keep their relative order; the rest float.
    Mixed,
}

impl TripType {
    /// Classify a stop list. Deleted stops are ignored.
    ///
    /// Recomputed from the stop list on every call. A list with no live
    /// stops is sequential.
    ///
    /// # Examples
    ///
    /// ```
    /// use trip_coordinator::domain::{GeoPoint, Stop, StopId, TripType};
    ///
    /// let here = GeoPoint::new(51.5, -0.1);
    /// let stops = vec![
    ///     Stop::new(StopId(0), "Depot", here, true),
    ///     Stop::new(StopId(1), "Customer", here, false),
    /// ];
    /// assert_eq!(TripType::resolve(&stops), TripType::Mixed);
    /// assert_eq!(TripType::resolve(&stops[..1]), TripType::Sequential);
    /// assert_eq!(TripType::resolve(&stops[1..]), TripType::FreeFloating);
    /// ```
    pub fn resolve(stops: &[Stop]) -> TripType {
        let mut any_sequenced = false;
        let mut any_free = false;
        for stop in stops.iter().filter(|s| !s.deleted) {
            if stop.sequenced {
                any_sequenced = true;
            } else {
                any_free = true;
            }
            if any_sequenced && any_free {
                return TripType::Mixed;
            }
        }
        if any_free {
            TripType::FreeFloating
        } else {
            TripType::Sequential
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripType::Sequential => "SEQUENTIAL",
            TripType::FreeFloating => "FREE_FLOATING",
            TripType::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoPoint, StopId};

    fn stops(flags: &[bool]) -> Vec<Stop> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &seq)| Stop::new(StopId(i as u32), "s", GeoPoint::new(0.0, 0.0), seq))
            .collect()
    }

    #[test]
    fn all_sequenced() {
        assert_eq!(TripType::resolve(&stops(&[true, true, true])), TripType::Sequential);
    }

    #[test]
    fn all_free_floating() {
        assert_eq!(TripType::resolve(&stops(&[false, false])), TripType::FreeFloating);
    }

    #[test]
    fn mixed() {
        assert_eq!(
            TripType::resolve(&stops(&[false, true, false, true, true])),
            TripType::Mixed
        );
    }

    #[test]
    fn deleted_stops_do_not_count() {
        let mut list = stops(&[true, false, true]);
        list[1].deleted = true;
        assert_eq!(TripType::resolve(&list), TripType::Sequential);
    }

    #[test]
    fn empty_list_is_sequential() {
        assert_eq!(TripType::resolve(&[]), TripType::Sequential);
    }

    #[test]
    fn display() {
        assert_eq!(TripType::Sequential.to_string(), "SEQUENTIAL");
        assert_eq!(TripType::FreeFloating.to_string(), "FREE_FLOATING");
        assert_eq!(TripType::Mixed.to_string(), "MIXED");
    }
}
