//! HTTP surface for the bookings service: create, read, list and cancel
//! bookings.

use crate::domain::{is_within_cancellation_cutoff, validate_new_booking, Booking, NewBooking};
use crate::error::BookingsError;
use crate::events::{publish_booking_event, BookingEvent};
use crate::state::BookingsState;
use crate::trips_client::TripsClientError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carpool_core::ids::{BookingId, TripId, UserId};
use carpool_web::handlers::health::{HealthCheck, HealthReporter, HealthStatus};
use carpool_web::{AppError, AuthUser};
use chrono::Utc;
use serde::Deserialize;

/// Request body for `POST /api/v1/bookings`.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// The trip being reserved against.
    pub trip_id: String,
    /// Seats requested.
    pub seats_requested: i32,
}

/// Request body for `PATCH /api/v1/bookings/:id/cancel`.
#[derive(Debug, Deserialize, Default)]
pub struct CancelBookingRequest {
    /// Free-text reason, shown back to the passenger.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query parameters for `GET /api/v1/bookings`.
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
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
pub async fn readiness(State(state): State<BookingsState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.check_health().await;
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// `POST /api/v1/bookings` - request seats on a trip.
///
/// Validates against an advisory read of the trip (driver, status, seat
/// count), then persists a `pending` booking and publishes
/// `reservation.created`. The trips service's own compare-and-update is the
/// authoritative accept/reject decision; this only rejects requests that
/// could never succeed.
///
/// # Errors
///
/// Returns [`AppError::validation`] if the request fails domain validation,
/// [`AppError::not_found`] if the trip doesn't exist, or a mapped
/// [`BookingsError`] for any downstream failure.
pub async fn create_booking(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let new_booking = NewBooking {
        trip_id: TripId::new(body.trip_id),
        seats_requested: body.seats_requested,
    };
    let passenger_id = UserId::new(auth.user_id);

    let trip = state
        .trips_client
        .get_trip(&new_booking.trip_id)
        .await
        .map_err(|error| match error {
            TripsClientError::NotFound => AppError::not_found("trip", new_booking.trip_id.as_str()),
            TripsClientError::Request(msg) => AppError::from_domain(BookingsError::TripsServiceUnavailable(msg)),
        })?;

    validate_new_booking(&new_booking, &passenger_id, &trip.driver_id, &trip.status, trip.available_seats)
        .map_err(AppError::validation)?;

    let booking = state
        .repository
        .create(&passenger_id, new_booking)
        .await
        .map_err(AppError::from_domain)?;

    let event = BookingEvent::ReservationCreated {
        booking_id: booking.id.as_str().to_string(),
        trip_id: booking.trip_id.as_str().to_string(),
        passenger_id: booking.passenger_id.as_str().to_string(),
        seats: booking.seats_requested,
        observed_version: 0,
    };
    if let Err(error) = publish_booking_event(state.event_bus.as_ref(), &event).await {
        tracing::error!(%error, booking_id = %booking.id, "failed to publish reservation.created");
    }

    Ok(Json(booking))
}

/// `GET /api/v1/bookings/:id` - fetch a single booking.
///
/// # Errors
///
/// Returns [`AppError::forbidden`] if the caller isn't the booking's
/// passenger, or a 404-mapped [`AppError`] if no such booking exists.
pub async fn get_booking(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .repository
        .find(&BookingId::new(id))
        .await
        .map_err(AppError::from_domain)?;

    if booking.passenger_id.as_str() != auth.user_id {
        return Err(AppError::from_domain(BookingsError::NotOwner));
    }

    Ok(Json(booking))
}

/// `GET /api/v1/bookings` - the authenticated passenger's bookings, newest first.
///
/// # Errors
///
/// Returns a mapped [`AppError`] on query failure.
pub async fn list_bookings(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let passenger_id = UserId::new(auth.user_id);
    let bookings = state
        .repository
        .list_for_passenger(&passenger_id, query.page, query.limit)
        .await
        .map_err(AppError::from_domain)?;

    Ok(Json(bookings))
}

/// `PATCH /api/v1/bookings/:id/cancel` - passenger-initiated cancellation.
///
/// Refused within [`crate::domain::CANCELLATION_CUTOFF_HOURS`] of departure,
/// and for bookings already in a terminal state.
///
/// # Errors
///
/// Returns [`AppError::forbidden`] if the caller isn't the booking's
/// passenger, or a mapped [`BookingsError`] for a terminal-state or
/// cutoff-window violation.
pub async fn cancel_booking(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking_id = BookingId::new(id);
    let booking = state.repository.find(&booking_id).await.map_err(AppError::from_domain)?;

    if booking.passenger_id.as_str() != auth.user_id {
        return Err(AppError::from_domain(BookingsError::NotOwner));
    }
    if booking.status.is_terminal() {
        return Err(AppError::from_domain(BookingsError::TerminalState));
    }

    let trip = state
        .trips_client
        .get_trip(&booking.trip_id)
        .await
        .map_err(|error| match error {
            TripsClientError::NotFound => AppError::not_found("trip", booking.trip_id.as_str()),
            TripsClientError::Request(msg) => AppError::from_domain(BookingsError::TripsServiceUnavailable(msg)),
        })?;

    if is_within_cancellation_cutoff(trip.departure_at, Utc::now()) {
        return Err(AppError::from_domain(BookingsError::CancellationWindowPassed));
    }

    let reason = body.reason.unwrap_or_else(|| "cancelled by passenger".to_string());
    let was_confirmed = booking.status == crate::domain::BookingStatus::Confirmed;

    let cancelled = state.repository.cancel(&booking_id, &reason).await.map_err(AppError::from_domain)?;

    if was_confirmed {
        let event = BookingEvent::ReservationCancelled {
            booking_id: cancelled.id.as_str().to_string(),
            trip_id: cancelled.trip_id.as_str().to_string(),
            seats: cancelled.seats_requested,
        };
        if let Err(error) = publish_booking_event(state.event_bus.as_ref(), &event).await {
            tracing::error!(%error, booking_id = %cancelled.id, "failed to publish reservation.cancelled");
        }
    }

    Ok(Json(cancelled))
}
