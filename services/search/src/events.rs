//! The projection consumer: turns trip lifecycle events into denormalized
//! search documents.

use crate::domain::SearchTrip;
use crate::repository::SearchRepository;
use crate::search_engine::{GuardedSearchEngine, SolrSearchEngine};
use crate::trips_client::TripsClient;
use crate::users_client::UsersClient;
use carpool_core::event::{EventError, SerializedEvent};
use carpool_core::event_bus::EventBus;
use carpool_core::ids::TripId;
use carpool_postgres::idempotency::IdempotencyLedger;
use carpool_runtime::metrics::{IdempotencyMetrics, SearchProjectionMetrics};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// The topic this consumer subscribes to.
pub const TRIPS_TOPIC: &str = "trips.events";

/// This consumer's identity in the idempotency ledger.
pub const CONSUMER_NAME: &str = "search.projection";

/// Concrete engine type this service wires up; an interior detail of this
/// module's consumer and the query path, kept as an alias so call sites
/// don't repeat the generic.
pub type Engine = GuardedSearchEngine<SolrSearchEngine>;

/// Run the projection consumer until the process is shut down.
pub async fn run_projection_consumer(
    bus: Arc<dyn EventBus>,
    repository: SearchRepository,
    trips_client: TripsClient,
    users_client: UsersClient,
    engine: Option<Arc<Engine>>,
    ledger: Arc<IdempotencyLedger>,
) {
    loop {
        match bus.subscribe(&[TRIPS_TOPIC]).await {
            Ok(mut stream) => {
                tracing::info!("projection consumer subscribed to {TRIPS_TOPIC}");
                while let Some(result) = stream.next().await {
                    match result {
                        Ok(envelope) => {
                            if let Err(error) =
                                handle_trip_event(&repository, &trips_client, &users_client, engine.as_deref(), &ledger, &envelope).await
                            {
                                tracing::error!(%error, event_id = %envelope.event_id, "failed to process trip event");
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, "projection consumer stream error");
                        }
                    }
                }
                tracing::warn!("projection consumer stream ended, reconnecting");
            }
            Err(error) => {
                tracing::error!(%error, "projection consumer failed to subscribe, retrying");
            }
        }
        sleep(Duration::from_secs(5)).await;
    }
}

async fn handle_trip_event(
    repository: &SearchRepository,
    trips_client: &TripsClient,
    users_client: &UsersClient,
    engine: Option<&Engine>,
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

    let trip_id = match envelope.event_type.as_str() {
        "trip.created.v1" | "trip.updated.v1" | "trip.cancelled.v1" | "reservation.confirmed.v1" | "reservation.failed.v1" => {
            extract_trip_id(envelope)?
        }
        other => {
            tracing::debug!(event_type = other, "projection consumer ignoring unrelated event type");
            return Ok(());
        }
    };

    denormalize(repository, trips_client, users_client, engine, &trip_id, envelope.timestamp).await;
    Ok(())
}

fn extract_trip_id(envelope: &SerializedEvent) -> Result<TripId, EventError> {
    envelope
        .payload
        .get("trip_id")
        .and_then(serde_json::Value::as_str)
        .map(TripId::new)
        .ok_or_else(|| EventError::DeserializationError("event payload missing trip_id".to_string()))
}

/// Fetch the latest trip and driver profile and write the resulting
/// document, discarding it if it turns out to be stale.
///
/// A search-engine write failure here is logged but never propagated: the
/// primary-store write, if it lands, is what matters for correctness, and
/// the engine will converge on the next update or a full reindex.
async fn denormalize(
    repository: &SearchRepository,
    trips_client: &TripsClient,
    users_client: &UsersClient,
    engine: Option<&Engine>,
    trip_id: &TripId,
    event_timestamp: chrono::DateTime<Utc>,
) {
    let trip = match trips_client.get_trip(trip_id).await {
        Ok(trip) => trip,
        Err(error) => {
            tracing::warn!(%error, trip_id = %trip_id, "projection consumer could not read trip, skipping");
            return;
        }
    };

    let driver_profile = match users_client.get_profile(&trip.driver_id).await {
        Ok(profile) => Some(profile),
        Err(error) => {
            tracing::warn!(%error, driver_id = %trip.driver_id, "projection consumer could not read driver profile, denormalizing without it");
            None
        }
    };

    let driver_name = driver_profile.as_ref().map_or_else(|| "unknown".to_string(), |p| p.display_name.clone());
    let driver_rating = driver_profile.as_ref().and_then(|p| p.average_rating);
    let driver_total_trips = driver_profile.as_ref().map_or(0, |p| p.total_trips_as_driver);

    let search_text = SearchTrip::build_search_text(&trip.origin.city, &trip.destination.city, &trip.origin.province, &trip.destination.province, &driver_name);

    let document = SearchTrip {
        trip_id: trip_id.clone(),
        driver_id: trip.driver_id,
        driver_name,
        driver_rating,
        driver_total_trips,
        origin_city: trip.origin.city,
        origin_province: trip.origin.province,
        origin_lat: trip.origin.lat,
        origin_lng: trip.origin.lng,
        destination_city: trip.destination.city,
        destination_province: trip.destination.province,
        destination_lat: trip.destination.lat,
        destination_lng: trip.destination.lng,
        departure_at: trip.departure_at,
        price_per_seat_cents: trip.price_per_seat_cents,
        available_seats: trip.available_seats,
        allows_pets: trip.preferences.allows_pets,
        allows_smoking: trip.preferences.allows_smoking,
        allows_music: trip.preferences.allows_music,
        status: trip.status,
        search_text,
        popularity_score: 0.0,
        availability_version: trip.availability_version,
        updated_at: Utc::now(),
    };

    let applied = match repository.upsert_if_newer(&document).await {
        Ok(applied) => applied,
        Err(error) => {
            tracing::error!(%error, trip_id = %trip_id, "failed to write search projection to primary store");
            return;
        }
    };

    if !applied {
        SearchProjectionMetrics::record_stale_skipped();
        return;
    }

    let lag = (Utc::now() - event_timestamp).to_std().unwrap_or_default();
    SearchProjectionMetrics::record_applied(lag);

    if let Some(engine) = engine {
        if let Err(error) = engine.index(&document).await {
            tracing::warn!(%error, trip_id = %trip_id, "search engine index write failed, primary store write still succeeded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_trip_id_reads_the_common_payload_field() {
        let envelope = SerializedEvent {
            event_id: "evt-1".to_string(),
            event_type: "trip.updated.v1".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({ "trip_id": "t-1" }),
            metadata: None,
        };
        let trip_id = extract_trip_id(&envelope).expect("trip_id present");
        assert_eq!(trip_id.as_str(), "t-1");
    }

    #[test]
    fn extract_trip_id_rejects_a_payload_missing_it() {
        let envelope = SerializedEvent {
            event_id: "evt-1".to_string(),
            event_type: "trip.updated.v1".to_string(),
            timestamp: Utc::now(),
            payload: serde_json::json!({}),
            metadata: None,
        };
        assert!(extract_trip_id(&envelope).is_err());
    }
}
