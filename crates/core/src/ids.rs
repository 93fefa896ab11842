//! Strongly typed identifiers that cross service boundaries.
//!
//! Every aggregate in the system is addressed by an opaque string id. Newtype
//! wrappers keep a trip id from being passed where a booking id is expected,
//! while still being cheap to clone and trivial to serialize on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id (e.g. loaded from storage).
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper, returning the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(TripId, "Identifies a trip in the trips service's inventory store.");
string_id!(BookingId, "Identifies a booking on the wire (UUID, but treated as opaque).");
string_id!(UserId, "Identifies a user (passenger or driver) as issued by the users service.");
string_id!(EventId, "Producer-assigned idempotency key carried on every bus message.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from() {
        let id = TripId::from("trip-123");
        assert_eq!(id.as_str(), "trip-123");
        assert_eq!(id.to_string(), "trip-123");
    }

    #[test]
    fn generate_produces_distinct_ids() {
        assert_ne!(EventId::generate(), EventId::generate());
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = BookingId::from("b-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"b-1\"");
    }
}
