//! Events this service publishes, and the background consumer that reacts
//! to booking events by applying or releasing seat inventory.

use crate::config::RESERVATION_RETRY_ATTEMPTS;
use crate::repository::TripRepository;
use carpool_core::event::{DomainEvent, EventError, SerializedEvent};
use carpool_core::event_bus::EventBus;
use carpool_core::ids::TripId;
use carpool_core::optimistic::Version;
use carpool_postgres::idempotency::IdempotencyLedger;
use carpool_runtime::metrics::IdempotencyMetrics;
use carpool_runtime::retry::{RetryPolicy, retry_with_backoff};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// The topic trip lifecycle and reservation-outcome events publish to.
pub const TRIPS_TOPIC: &str = "trips.events";

/// The topic booking events are consumed from.
pub const BOOKINGS_TOPIC: &str = "bookings.events";

/// This consumer's identity in the idempotency ledger and bus consumer group.
pub const CONSUMER_NAME: &str = "trips.reservation_consumer";

/// Events this service publishes onto [`TRIPS_TOPIC`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TripEvent {
    /// A trip was created and published for reservation.
    Created {
        /// The trip id.
        trip_id: String,
        /// The driver who owns it.
        driver_id: String,
        /// Seats offered at creation.
        total_seats: i32,
    },
    /// A trip's mutable details were updated.
    Updated {
        /// The trip id.
        trip_id: String,
        /// The driver who owns it.
        driver_id: String,
        /// Seats still open for reservation.
        available_seats: i32,
        /// Lifecycle status.
        status: String,
        /// Optimistic concurrency version after the update.
        availability_version: i64,
    },
    /// A trip was cancelled by its driver.
    Cancelled {
        /// The trip id.
        trip_id: String,
        /// The driver who owns it.
        driver_id: String,
        /// Seats still open for reservation at the time of cancellation.
        available_seats: i32,
        /// Lifecycle status (always `"cancelled"`).
        status: String,
        /// Optimistic concurrency version after the cancellation.
        availability_version: i64,
        /// Free-text reason given by the driver.
        reason: String,
    },
    /// A reservation's seat delta was successfully applied.
    ReservationConfirmed {
        /// The booking that requested the reservation.
        booking_id: String,
        /// The trip whose inventory was adjusted.
        trip_id: String,
        /// The passenger who made the booking.
        passenger_id: String,
        /// The trip's driver.
        driver_id: String,
        /// Seats reserved.
        seats_reserved: i32,
        /// Total price for the reserved seats, in cents.
        total_price_cents: i64,
        /// Seats left open after this reservation.
        available_seats: i32,
        /// The resulting availability version.
        availability_version: i64,
    },
    /// A reservation could not be applied after exhausting retries.
    ReservationFailed {
        /// The booking that requested the reservation.
        booking_id: String,
        /// The trip whose inventory was targeted.
        trip_id: String,
        /// Why the reservation could not be applied.
        reason: String,
        /// Seats open on the trip at the time of failure.
        available_seats: i32,
    },
}

impl DomainEvent for TripEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "trip.created.v1",
            Self::Updated { .. } => "trip.updated.v1",
            Self::Cancelled { .. } => "trip.cancelled.v1",
            Self::ReservationConfirmed { .. } => "reservation.confirmed.v1",
            Self::ReservationFailed { .. } => "reservation.failed.v1",
        }
    }
}

/// Publish a [`TripEvent`] onto [`TRIPS_TOPIC`].
///
/// # Errors
///
/// Returns [`carpool_core::event_bus::EventBusError`] if the envelope
/// cannot be built or the transport rejects the publish.
pub async fn publish_trip_event(
    bus: &dyn EventBus,
    event: &TripEvent,
) -> Result<(), carpool_core::event_bus::EventBusError> {
    let envelope = SerializedEvent::from_event(Uuid::new_v4().to_string(), Utc::now(), event, None)
        .map_err(|e| carpool_core::event_bus::EventBusError::Other(e.to_string()))?;
    bus.publish(TRIPS_TOPIC, &envelope).await
}

/// Payload carried by `reservation.created.v1`, published by the bookings
/// service when a rider requests seats on a trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReservationCreated {
    /// The booking requesting seats.
    pub booking_id: String,
    /// The trip to reserve against.
    pub trip_id: String,
    /// The passenger making the request.
    pub passenger_id: String,
    /// How many seats to hold.
    pub seats: i32,
    /// The optimistic version the booking observed when it read the trip.
    pub observed_version: i64,
}

impl DomainEvent for ReservationCreated {
    fn event_type(&self) -> &'static str {
        "reservation.created.v1"
    }
}

/// Payload carried by `reservation.cancelled.v1`, published when a
/// confirmed booking is cancelled and its seats must be released.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReservationCancelled {
    /// The booking releasing its seats.
    pub booking_id: String,
    /// The trip to release seats back to.
    pub trip_id: String,
    /// How many seats to release.
    pub seats: i32,
}

impl DomainEvent for ReservationCancelled {
    fn event_type(&self) -> &'static str {
        "reservation.cancelled.v1"
    }
}

/// Run the reservation consumer until the process is shut down.
///
/// Reconnects with a fixed backoff if the subscription drops, matching
/// every other long-lived consumer task in this system.
pub async fn run_reservation_consumer(
    bus: Arc<dyn EventBus>,
    repository: TripRepository,
    ledger: Arc<IdempotencyLedger>,
) {
    loop {
        match bus.subscribe(&[BOOKINGS_TOPIC]).await {
            Ok(mut stream) => {
                tracing::info!("reservation consumer subscribed to {BOOKINGS_TOPIC}");
                while let Some(result) = stream.next().await {
                    match result {
                        Ok(envelope) => {
                            if let Err(error) = handle_booking_event(&bus, &repository, &ledger, &envelope).await {
                                tracing::error!(%error, event_id = %envelope.event_id, "failed to process booking event");
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, "reservation consumer stream error");
                        }
                    }
                }
                tracing::warn!("reservation consumer stream ended, reconnecting");
            }
            Err(error) => {
                tracing::error!(%error, "reservation consumer failed to subscribe, retrying");
            }
        }
        sleep(Duration::from_secs(5)).await;
    }
}

async fn handle_booking_event(
    bus: &Arc<dyn EventBus>,
    repository: &TripRepository,
    ledger: &IdempotencyLedger,
    envelope: &SerializedEvent,
) -> Result<(), EventError> {
    // Step 1: idempotency check. A duplicate delivery of an event this
    // consumer already recorded is dropped here, before it can touch
    // inventory twice.
    let newly_recorded = ledger
        .try_record(&envelope.event_id, &envelope.event_type, CONSUMER_NAME)
        .await
        .map_err(|e| EventError::DeserializationError(e.to_string()))?;

    if !newly_recorded {
        IdempotencyMetrics::record_duplicate();
        return Ok(());
    }

    match envelope.event_type.as_str() {
        "reservation.created.v1" => {
            let created: ReservationCreated = envelope.decode()?;
            apply_reservation(bus, repository, created).await;
        }
        "reservation.cancelled.v1" => {
            let cancelled: ReservationCancelled = envelope.decode()?;
            release_reservation(repository, cancelled).await;
        }
        other => {
            tracing::debug!(event_type = other, "reservation consumer ignoring unrelated event type");
        }
    }

    Ok(())
}

/// Step 2 and 3 of the reservation consumer algorithm: apply the seat delta
/// with bounded retries, compensating with `reservation.failed` if every
/// attempt loses the optimistic concurrency race.
async fn apply_reservation(bus: &Arc<dyn EventBus>, repository: &TripRepository, created: ReservationCreated) {
    let trip_id = TripId::new(created.trip_id.clone());
    let policy = RetryPolicy::builder().max_retries(RESERVATION_RETRY_ATTEMPTS).build();

    let outcome = retry_with_backoff(policy, || {
        let trip_id = trip_id.clone();
        let repository = repository.clone();
        async move {
            let trip = repository.find(&trip_id).await.map_err(|e| e.to_string())?;
            repository
                .apply_reservation_delta(&trip_id, -created.seats, Version::new(trip.availability_version))
                .await
                .map_err(|e| e.to_string())
        }
    })
    .await;

    match outcome {
        Ok(trip) => {
            let event = TripEvent::ReservationConfirmed {
                booking_id: created.booking_id.clone(),
                trip_id: created.trip_id.clone(),
                passenger_id: created.passenger_id.clone(),
                driver_id: trip.driver_id.as_str().to_string(),
                seats_reserved: created.seats,
                total_price_cents: trip.price_per_seat_cents * i64::from(created.seats),
                available_seats: trip.available_seats,
                availability_version: trip.availability_version,
            };
            if let Err(error) = publish_trip_event(bus.as_ref(), &event).await {
                tracing::error!(%error, booking_id = %created.booking_id, "failed to publish reservation.confirmed");
            }
        }
        Err(reason) => {
            // Persistent failure after exhausting retries: compensate. The
            // ledger entry was already recorded in step 1, and that's
            // correct here - the compensating publish below is the
            // business effect this delivery produces.
            tracing::warn!(booking_id = %created.booking_id, trip_id = %created.trip_id, %reason, "reservation could not be applied, compensating");
            let available_seats = repository
                .find(&trip_id)
                .await
                .map(|trip| trip.available_seats)
                .unwrap_or_default();
            let event = TripEvent::ReservationFailed {
                booking_id: created.booking_id.clone(),
                trip_id: created.trip_id.clone(),
                reason,
                available_seats,
            };
            if let Err(error) = publish_trip_event(bus.as_ref(), &event).await {
                tracing::error!(%error, booking_id = %created.booking_id, "failed to publish reservation.failed");
            }
        }
    }
}

async fn release_reservation(repository: &TripRepository, cancelled: ReservationCancelled) {
    let trip_id = TripId::new(cancelled.trip_id.clone());
    let policy = RetryPolicy::builder().max_retries(RESERVATION_RETRY_ATTEMPTS).build();

    let outcome = retry_with_backoff(policy, || {
        let trip_id = trip_id.clone();
        let repository = repository.clone();
        async move {
            let trip = repository.find(&trip_id).await.map_err(|e| e.to_string())?;
            repository
                .apply_reservation_delta(&trip_id, cancelled.seats, Version::new(trip.availability_version))
                .await
                .map_err(|e| e.to_string())
        }
    })
    .await;

    if let Err(reason) = outcome {
        // A release losing every retry leaves the trip's seat count
        // understated until the next successful mutation nudges the
        // version forward; there is no compensating event for a release.
        tracing::error!(booking_id = %cancelled.booking_id, trip_id = %cancelled.trip_id, %reason, "failed to release reservation after retries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_event_type_strings_are_versioned() {
        let event = TripEvent::Created {
            trip_id: "t-1".into(),
            driver_id: "d-1".into(),
            total_seats: 4,
        };
        assert_eq!(event.event_type(), "trip.created.v1");
    }

    #[test]
    fn reservation_created_round_trips_through_json_payload() {
        let created = ReservationCreated {
            booking_id: "b-1".into(),
            trip_id: "t-1".into(),
            passenger_id: "p-1".into(),
            seats: 2,
            observed_version: 0,
        };
        let payload = created.to_payload().expect("encode");
        let decoded = ReservationCreated::from_payload(payload).expect("decode");
        assert_eq!(decoded.booking_id, "b-1");
        assert_eq!(decoded.seats, 2);
    }
}
