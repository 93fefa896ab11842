//! HTTP surface for the trips service: create, read, update and cancel
//! trips.

use crate::domain::{CarDescriptor, Location, NewTrip, Preferences, Trip, TripPatch, TripStatus, validate_new_trip, validate_update};
use crate::error::TripsError;
use crate::events::{TripEvent, publish_trip_event};
use crate::state::TripsState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carpool_core::ids::{TripId, UserId};
use carpool_web::handlers::health::{HealthCheck, HealthReporter, HealthStatus};
use carpool_web::{AppError, AuthUser};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Request body for `POST /api/v1/trips`.
#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    /// Pickup location.
    pub origin: Location,
    /// Drop-off location.
    pub destination: Location,
    /// Scheduled departure time.
    pub departure_at: DateTime<Utc>,
    /// Estimated arrival time.
    pub estimated_arrival_at: DateTime<Utc>,
    /// Price per seat, in cents.
    pub price_per_seat_cents: i64,
    /// Seats offered.
    pub total_seats: i32,
    /// Vehicle details.
    pub car: CarDescriptor,
    /// Ride preferences.
    #[serde(default)]
    pub preferences: Preferences,
}

/// Request body for `PUT /api/v1/trips/:id`.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTripRequest {
    /// New departure time, if changing.
    pub departure_at: Option<DateTime<Utc>>,
    /// New estimated arrival time, if changing.
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    /// New price per seat, if changing.
    pub price_per_seat_cents: Option<i64>,
    /// New total seat count, if changing.
    pub total_seats: Option<i32>,
    /// New ride preferences, if changing.
    pub preferences: Option<Preferences>,
}

/// Request body for `PATCH /api/v1/trips/:id/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelTripRequest {
    /// Free-text cancellation reason shown to affected riders.
    pub reason: String,
}

/// Query parameters for `GET /api/v1/trips`.
#[derive(Debug, Deserialize)]
pub struct ListTripsQuery {
    /// Restrict to a single driver's trips.
    pub driver_id: Option<String>,
    /// Restrict to a single lifecycle status.
    pub status: Option<String>,
    /// 1-indexed page number.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_page() -> i64 {
    1
}

const fn default_limit() -> i64 {
    20
}

/// `GET /health/ready` - reports whether this instance's dependencies are
/// actually usable, not just whether the process is running.
pub async fn readiness(State(state): State<TripsState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.check_health().await;
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// `POST /api/v1/trips` - publish a new trip.
///
/// # Errors
///
/// Returns [`AppError::validation`] if the request fails domain validation,
/// or a mapped [`TripsError`] for any downstream failure.
pub async fn create_trip(
    State(state): State<TripsState>,
    auth: AuthUser,
    Json(body): Json<CreateTripRequest>,
) -> Result<Json<Trip>, AppError> {
    let new_trip = NewTrip {
        origin: body.origin,
        destination: body.destination,
        departure_at: body.departure_at,
        estimated_arrival_at: body.estimated_arrival_at,
        price_per_seat_cents: body.price_per_seat_cents,
        total_seats: body.total_seats,
        car: body.car,
        preferences: body.preferences,
    };

    validate_new_trip(&new_trip, Utc::now()).map_err(AppError::validation)?;

    let driver_id = UserId::new(auth.user_id);
    let trip = state
        .repository
        .create(&driver_id, new_trip)
        .await
        .map_err(AppError::from_domain)?;

    let event = TripEvent::Created {
        trip_id: trip.id.as_str().to_string(),
        driver_id: trip.driver_id.as_str().to_string(),
        total_seats: trip.total_seats,
    };
    if let Err(error) = publish_trip_event(state.event_bus.as_ref(), &event).await {
        tracing::error!(%error, trip_id = %trip.id, "failed to publish trip.created");
    }

    Ok(Json(trip))
}

/// `GET /api/v1/trips/:id` - fetch a single trip.
///
/// # Errors
///
/// Returns a 404-mapped [`AppError`] if no such trip exists.
pub async fn get_trip(State(state): State<TripsState>, Path(id): Path<String>) -> Result<Json<Trip>, AppError> {
    let trip = state
        .repository
        .find(&TripId::new(id))
        .await
        .map_err(AppError::from_domain)?;
    Ok(Json(trip))
}

/// `GET /api/v1/trips` - list and filter trips.
///
/// # Errors
///
/// Returns a mapped [`AppError`] on query failure.
pub async fn list_trips(
    State(state): State<TripsState>,
    Query(query): Query<ListTripsQuery>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(TripStatus::parse)
        .transpose()
        .map_err(|raw| AppError::bad_request(format!("unknown status: {raw}")))?;

    let driver_id = query.driver_id.map(UserId::new);
    let trips = state
        .repository
        .list(driver_id.as_ref(), status, query.page, query.limit)
        .await
        .map_err(AppError::from_domain)?;

    Ok(Json(trips))
}

/// `PUT /api/v1/trips/:id` - update a trip's mutable details. Forbidden once
/// any seat is reserved.
///
/// # Errors
///
/// Returns [`AppError::forbidden`] if the caller isn't the owning driver, or
/// [`AppError::validation`] if the patch violates the update invariants.
pub async fn update_trip(
    State(state): State<TripsState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateTripRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip_id = TripId::new(id);
    let trip = state.repository.find(&trip_id).await.map_err(AppError::from_domain)?;

    if trip.driver_id.as_str() != auth.user_id {
        return Err(AppError::from_domain(TripsError::NotOwner));
    }

    let patch = TripPatch {
        departure_at: body.departure_at,
        estimated_arrival_at: body.estimated_arrival_at,
        price_per_seat_cents: body.price_per_seat_cents,
        total_seats: body.total_seats,
        preferences: body.preferences,
    };

    validate_update(&trip, &patch).map_err(AppError::validation)?;

    let updated = state.repository.update(&trip_id, &patch).await.map_err(AppError::from_domain)?;

    let event = TripEvent::Updated {
        trip_id: updated.id.as_str().to_string(),
        driver_id: updated.driver_id.as_str().to_string(),
        available_seats: updated.available_seats,
        status: updated.status.as_str().to_string(),
        availability_version: updated.availability_version,
    };
    if let Err(error) = publish_trip_event(state.event_bus.as_ref(), &event).await {
        tracing::error!(%error, trip_id = %updated.id, "failed to publish trip.updated");
    }

    Ok(Json(updated))
}

/// `PATCH /api/v1/trips/:id/cancel` - cancel a trip.
///
/// # Errors
///
/// Returns [`AppError::forbidden`] if the caller isn't the owning driver.
pub async fn cancel_trip(
    State(state): State<TripsState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CancelTripRequest>,
) -> Result<Json<Trip>, AppError> {
    let trip_id = TripId::new(id);
    let trip = state.repository.find(&trip_id).await.map_err(AppError::from_domain)?;

    if trip.driver_id.as_str() != auth.user_id {
        return Err(AppError::from_domain(TripsError::NotOwner));
    }

    let cancelled = state
        .repository
        .cancel(&trip_id, &UserId::new(auth.user_id), &body.reason)
        .await
        .map_err(AppError::from_domain)?;

    let event = TripEvent::Cancelled {
        trip_id: cancelled.id.as_str().to_string(),
        driver_id: cancelled.driver_id.as_str().to_string(),
        available_seats: cancelled.available_seats,
        status: cancelled.status.as_str().to_string(),
        availability_version: cancelled.availability_version,
        reason: body.reason,
    };
    if let Err(error) = publish_trip_event(state.event_bus.as_ref(), &event).await {
        tracing::error!(%error, trip_id = %cancelled.id, "failed to publish trip.cancelled");
    }

    Ok(Json(cancelled))
}

