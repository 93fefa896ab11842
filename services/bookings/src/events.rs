//! Events this service publishes, and the consumer that reacts to trip
//! lifecycle and reservation-outcome events by transitioning bookings.

use crate::repository::BookingRepository;
use carpool_core::event::{DomainEvent, EventError, SerializedEvent};
use carpool_core::event_bus::EventBus;
use carpool_core::ids::BookingId;
use carpool_postgres::idempotency::IdempotencyLedger;
use carpool_runtime::metrics::{BookingMetrics, IdempotencyMetrics};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// The topic this service publishes reservation requests/releases to.
pub const BOOKINGS_TOPIC: &str = "bookings.events";

/// The topic trip lifecycle and reservation-outcome events are consumed from.
pub const TRIPS_TOPIC: &str = "trips.events";

/// This consumer's identity in the idempotency ledger and bus consumer group.
pub const CONSUMER_NAME: &str = "bookings.trip_event_consumer";

/// Events this service publishes onto [`BOOKINGS_TOPIC`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BookingEvent {
    /// A passenger requested seats on a trip.
    ReservationCreated {
        /// The booking requesting seats.
        booking_id: String,
        /// The trip to reserve against.
        trip_id: String,
        /// The passenger making the request.
        passenger_id: String,
        /// Seats requested.
        seats: i32,
        /// The availability version this booking observed when created.
        observed_version: i64,
    },
    /// A confirmed booking was cancelled and its seats must be released.
    ReservationCancelled {
        /// The booking releasing its seats.
        booking_id: String,
        /// The trip to release seats back to.
        trip_id: String,
        /// Seats to release.
        seats: i32,
    },
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ReservationCreated { .. } => "reservation.created.v1",
            Self::ReservationCancelled { .. } => "reservation.cancelled.v1",
        }
    }
}

/// Publish a [`BookingEvent`] onto [`BOOKINGS_TOPIC`].
///
/// # Errors
///
/// Returns [`carpool_core::event_bus::EventBusError`] if the envelope
/// cannot be built or the transport rejects the publish.
pub async fn publish_booking_event(
    bus: &dyn EventBus,
    event: &BookingEvent,
) -> Result<(), carpool_core::event_bus::EventBusError> {
    let envelope = SerializedEvent::from_event(Uuid::new_v4().to_string(), Utc::now(), event, None)
        .map_err(|e| carpool_core::event_bus::EventBusError::Other(e.to_string()))?;
    bus.publish(BOOKINGS_TOPIC, &envelope).await
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ReservationConfirmed {
    booking_id: String,
    #[allow(dead_code)]
    trip_id: String,
    #[allow(dead_code)]
    passenger_id: String,
    driver_id: String,
    #[allow(dead_code)]
    seats_reserved: i32,
    total_price_cents: i64,
    #[allow(dead_code)]
    available_seats: i32,
    #[allow(dead_code)]
    availability_version: i64,
}

impl DomainEvent for ReservationConfirmed {
    fn event_type(&self) -> &'static str {
        "reservation.confirmed.v1"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ReservationFailed {
    booking_id: String,
    #[allow(dead_code)]
    trip_id: String,
    reason: String,
    #[allow(dead_code)]
    available_seats: i32,
}

impl DomainEvent for ReservationFailed {
    fn event_type(&self) -> &'static str {
        "reservation.failed.v1"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TripCancelled {
    trip_id: String,
    #[allow(dead_code)]
    driver_id: String,
    #[allow(dead_code)]
    available_seats: i32,
    #[allow(dead_code)]
    status: String,
    #[allow(dead_code)]
    availability_version: i64,
    reason: String,
}

impl DomainEvent for TripCancelled {
    fn event_type(&self) -> &'static str {
        "trip.cancelled.v1"
    }
}

/// Run the trip-event consumer until the process is shut down.
pub async fn run_trip_event_consumer(bus: Arc<dyn EventBus>, repository: BookingRepository, ledger: Arc<IdempotencyLedger>) {
    loop {
        match bus.subscribe(&[TRIPS_TOPIC]).await {
            Ok(mut stream) => {
                tracing::info!("trip event consumer subscribed to {TRIPS_TOPIC}");
                while let Some(result) = stream.next().await {
                    match result {
                        Ok(envelope) => {
                            if let Err(error) = handle_trip_event(&repository, &ledger, &envelope).await {
                                tracing::error!(%error, event_id = %envelope.event_id, "failed to process trip event");
                            }
                        }
                        Err(error) => tracing::warn!(%error, "trip event consumer stream error"),
                    }
                }
                tracing::warn!("trip event consumer stream ended, reconnecting");
            }
            Err(error) => tracing::error!(%error, "trip event consumer failed to subscribe, retrying"),
        }
        sleep(Duration::from_secs(5)).await;
    }
}

async fn handle_trip_event(
    repository: &BookingRepository,
    ledger: &IdempotencyLedger,
    envelope: &SerializedEvent,
) -> Result<(), EventError> {
    let newly_recorded = ledger
        .try_record(&envelope.event_id, &envelope.event_type, CONSUMER_NAME)
        .await
        .map_err(|e| EventError::DeserializationError(e.to_string()))?;

    if !newly_recorded {
        IdempotencyMetrics::record_duplicate();
        return Ok(());
    }

    match envelope.event_type.as_str() {
        "reservation.confirmed.v1" => {
            let confirmed: ReservationConfirmed = envelope.decode()?;
            apply_confirmation(repository, confirmed).await;
        }
        "reservation.failed.v1" => {
            let failed: ReservationFailed = envelope.decode()?;
            apply_failure(repository, failed).await;
        }
        "trip.cancelled.v1" => {
            let cancelled: TripCancelled = envelope.decode()?;
            apply_trip_cancellation(repository, cancelled).await;
        }
        other => tracing::debug!(event_type = other, "trip event consumer ignoring unrelated event type"),
    }

    Ok(())
}

async fn apply_confirmation(repository: &BookingRepository, confirmed: ReservationConfirmed) {
    let booking_id = BookingId::new(confirmed.booking_id.clone());

    let Ok(Some(_booking)) = repository.find_opt(&booking_id).await else {
        // Absent booking: the event arrived before the local insert
        // landed, or this is a stray redelivery. Acknowledge silently.
        tracing::debug!(booking_id = %confirmed.booking_id, "confirmation for unknown booking, acknowledging silently");
        return;
    };

    let driver_id = carpool_core::ids::UserId::new(confirmed.driver_id.clone());

    if let Err(error) = repository.confirm(&booking_id, &driver_id, confirmed.total_price_cents).await {
        tracing::error!(%error, booking_id = %confirmed.booking_id, "failed to confirm booking");
        return;
    }
    BookingMetrics::record_confirmed(Duration::from_secs(0));
}

async fn apply_failure(repository: &BookingRepository, failed: ReservationFailed) {
    let booking_id = BookingId::new(failed.booking_id.clone());

    match repository.find_opt(&booking_id).await {
        Ok(Some(_)) => {
            if let Err(error) = repository.fail(&booking_id, &failed.reason).await {
                tracing::error!(%error, booking_id = %failed.booking_id, "failed to mark booking failed");
                return;
            }
            BookingMetrics::record_failed(Duration::from_secs(0));
        }
        Ok(None) => tracing::debug!(booking_id = %failed.booking_id, "failure for unknown booking, acknowledging silently"),
        Err(error) => tracing::error!(%error, booking_id = %failed.booking_id, "failed to look up booking"),
    }
}

async fn apply_trip_cancellation(repository: &BookingRepository, cancelled: TripCancelled) {
    let reason = format!("Trip cancelled by driver: {}", cancelled.reason);
    match repository
        .cancel_all_for_trip(&carpool_core::ids::TripId::new(cancelled.trip_id.clone()), &reason)
        .await
    {
        Ok(ids) => {
            for _ in &ids {
                BookingMetrics::record_cancelled();
            }
            tracing::info!(trip_id = %cancelled.trip_id, count = ids.len(), "cancelled bookings for cancelled trip");
        }
        Err(error) => tracing::error!(%error, trip_id = %cancelled.trip_id, "failed to cancel bookings for trip"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_event_type_strings_are_versioned() {
        let event = BookingEvent::ReservationCreated {
            booking_id: "b-1".into(),
            trip_id: "t-1".into(),
            passenger_id: "p-1".into(),
            seats: 2,
            observed_version: 1,
        };
        assert_eq!(event.event_type(), "reservation.created.v1");
    }

    #[test]
    fn reservation_cancelled_round_trips_through_json_payload() {
        let event = BookingEvent::ReservationCancelled {
            booking_id: "b-1".into(),
            trip_id: "t-1".into(),
            seats: 2,
        };
        let payload = event.to_payload().expect("encode");
        let decoded = BookingEvent::from_payload(payload).expect("decode");
        assert_eq!(decoded.event_type(), "reservation.cancelled.v1");
    }
}
