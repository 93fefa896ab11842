//! Domain event trait and the JSON wire envelope used on the bus.
//!
//! # Design
//!
//! Every message on the bus is JSON, not a binary format: operators need to
//! be able to read a message off the topic with a plain consumer CLI while
//! debugging a stuck reservation, and every consumer of the bus (including
//! the search projection and any future analytics sink) can decode it without
//! linking against Rust-specific serialization code.
//!
//! # Example
//!
//! ```
//! use carpool_core::event::DomainEvent;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum BookingEvent {
//!     Created { booking_id: String },
//!     Failed { booking_id: String, reason: String },
//! }
//!
//! impl DomainEvent for BookingEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             BookingEvent::Created { .. } => "booking.created",
//!             BookingEvent::Failed { .. } => "booking.failed",
//!         }
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event (de)serialization.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize the event payload to JSON.
    #[error("failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize the event payload from JSON.
    #[error("failed to deserialize event: {0}")]
    DeserializationError(String),

    /// The envelope named an `event_type` this consumer doesn't recognize.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event that can be published on the bus and later replayed.
///
/// # Event Naming Convention
///
/// `event_type()` returns a stable, versioned identifier, e.g. `"trip.created.v1"`.
/// This allows the schema to evolve without breaking consumers pinned to an
/// older version string.
pub trait DomainEvent: Send + Sync + 'static {
    /// The wire identifier for this event variant.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if `serde_json` fails to
    /// encode the value (practically unreachable for well-formed domain types).
    fn to_payload(&self) -> Result<serde_json::Value, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_value(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload doesn't
    /// match this type's shape.
    fn from_payload(payload: serde_json::Value) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_value(payload).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// The envelope every message carries on the bus: `{event_id, event_type,
/// timestamp, ...payload}`, plus optional correlation metadata.
///
/// This is the unit actually handed to [`crate::event_bus::EventBus::publish`]
/// and returned from [`crate::event_bus::EventBus::subscribe`] - domain event
/// types are encoded into and decoded out of its `payload` field.
#[derive(Clone, Debug, Serialize, serde::Deserialize)]
pub struct SerializedEvent {
    /// Producer-assigned idempotency key. The idempotency ledger uses this
    /// (not the event's business content) as its uniqueness key.
    pub event_id: String,

    /// The event type identifier (e.g. `"booking.created.v1"`).
    pub event_type: String,

    /// When the producer created this event.
    pub timestamp: DateTime<Utc>,

    /// The event's own fields, as a JSON object.
    pub payload: serde_json::Value,

    /// Optional envelope metadata: correlation id, causation id, producer.
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Build an envelope from an event id and a [`DomainEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the event cannot be
    /// encoded to JSON.
    pub fn from_event<E: DomainEvent + Serialize>(
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_id: event_id.into(),
            event_type: event.event_type().to_string(),
            timestamp,
            payload: event.to_payload()?,
            metadata,
        })
    }

    /// Decode the envelope's payload into a concrete [`DomainEvent`] type.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload doesn't
    /// match `E`'s shape.
    pub fn decode<E: DomainEvent + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_payload(self.payload.clone())
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ id: {}, type: {} }}",
            self.event_id, self.event_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    enum TestEvent {
        Created { id: String, value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "test.created.v1",
            }
        }
    }

    #[test]
    fn event_type_returns_correct_identifier() {
        let event = TestEvent::Created {
            id: "t-1".to_string(),
            value: 42,
        };
        assert_eq!(event.event_type(), "test.created.v1");
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let event = TestEvent::Created {
            id: "t-1".to_string(),
            value: 42,
        };
        let envelope =
            SerializedEvent::from_event("evt-1", Utc::now(), &event, None).expect("encode");
        let json = serde_json::to_string(&envelope).expect("serialize envelope");
        let decoded: SerializedEvent = serde_json::from_str(&json).expect("decode envelope");
        let rebuilt: TestEvent = decoded.decode().expect("decode payload");
        assert_eq!(rebuilt, event);
    }

    #[test]
    fn envelope_display_includes_id_and_type() {
        let envelope = SerializedEvent {
            event_id: "evt-1".to_string(),
            event_type: "test.created.v1".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({}),
            metadata: None,
        };
        let display = format!("{envelope}");
        assert!(display.contains("evt-1"));
        assert!(display.contains("test.created.v1"));
    }
}
