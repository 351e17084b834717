//! Identifier types for dispatches, stops and the vehicle's owner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

/// Parse a backend identifier: a positive decimal integer.
fn parse_positive(s: &str, kind: &'static str) -> Result<i64, InvalidId> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InvalidId {
            kind,
            reason: "must not be empty",
        });
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidId {
            kind,
            reason: "must contain only ASCII digits",
        });
    }
    let value: i64 = s.parse().map_err(|_| InvalidId {
        kind,
        reason: "out of range",
    })?;
    if value <= 0 {
        return Err(InvalidId {
            kind,
            reason: "must be positive",
        });
    }
    Ok(value)
}

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Parse the identifier from its string form.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                parse_positive(s, $kind).map($name)
            }

            /// Returns the raw numeric value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = InvalidId;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                if value <= 0 {
                    return Err(InvalidId {
                        kind: $kind,
                        reason: "must be positive",
                    });
                }
                Ok($name(value))
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

backend_id!(
    /// Identifier of a dispatch (one trip assigned to the vehicle).
    ///
    /// # Examples
    ///
    /// ```
    /// use trip_coordinator::domain::DispatchId;
    ///
    /// let id = DispatchId::parse("4711").unwrap();
    /// assert_eq!(id.get(), 4711);
    ///
    /// assert!(DispatchId::parse("").is_err());
    /// assert!(DispatchId::parse("-1").is_err());
    /// assert!(DispatchId::parse("abc").is_err());
    /// ```
    DispatchId,
    "dispatch"
);

backend_id!(
    /// Identifier of the customer account that owns the vehicle.
    CustomerId,
    "customer"
);

backend_id!(
    /// Identifier of the vehicle this process runs on.
    VehicleId,
    "vehicle"
);

/// Identifier of a stop, unique within its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(pub u32);

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StopId {
    fn from(value: u32) -> Self {
        StopId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert_eq!(DispatchId::parse("1").unwrap().get(), 1);
        assert_eq!(DispatchId::parse(" 42 ").unwrap().get(), 42);
        assert_eq!(CustomerId::parse("10119").unwrap().get(), 10119);
        assert_eq!(VehicleId::parse("7").unwrap().get(), 7);
    }

    #[test]
    fn reject_empty() {
        let err = DispatchId::parse("").unwrap_err();
        assert_eq!(err.to_string(), "invalid dispatch id: must not be empty");
        assert!(VehicleId::parse("   ").is_err());
    }

    #[test]
    fn reject_sentinel_and_non_numeric() {
        assert!(DispatchId::parse("-1").is_err());
        assert!(DispatchId::parse("0").is_err());
        assert!(CustomerId::parse("12a").is_err());
        assert!(CustomerId::parse("1.5").is_err());
        let err = VehicleId::parse("99999999999999999999").unwrap_err();
        assert_eq!(err.to_string(), "invalid vehicle id: out of range");
    }

    #[test]
    fn display_and_debug() {
        let id = DispatchId::parse("55").unwrap();
        assert_eq!(id.to_string(), "55");
        assert_eq!(format!("{:?}", id), "DispatchId(55)");
        assert_eq!(StopId(3).to_string(), "3");
    }

    #[test]
    fn serde_uses_plain_integers() {
        let id = DispatchId::parse("55").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "55");
        let back: DispatchId = serde_json::from_str("55").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<DispatchId>("-1").is_err());
        assert_eq!(serde_json::to_string(&StopId(4)).unwrap(), "4");
    }

    #[test]
    fn stop_id_ordering() {
        assert!(StopId(1) < StopId(2));
        let id: StopId = 9.into();
        assert_eq!(id, StopId(9));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any positive integer survives a format/parse roundtrip
        #[test]
        fn roundtrip(n in 1i64..i64::MAX) {
            let id = DispatchId::parse(&n.to_string()).unwrap();
            prop_assert_eq!(id.get(), n);
        }

        /// Strings containing a non-digit are always rejected
        #[test]
        fn non_digits_rejected(s in "[0-9]{0,3}[a-zA-Z_.-][0-9a-z]{0,3}") {
            prop_assert!(DispatchId::parse(&s).is_err());
        }
    }
}
