//! Bookings service: the booking lifecycle controller sitting between
//! passengers and the trips service's seat inventory.
//!
//! Exposed as a library (in addition to the `bookings-service` binary) so
//! integration tests can exercise [`repository::BookingRepository`] and the
//! HTTP surface directly against a real database.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod handlers;
pub mod repository;
pub mod state;
pub mod trips_client;

use axum::routing::{get, patch, post};
use axum::Router;
use state::BookingsState;
use tower_http::trace::TraceLayer;

/// Build the bookings service's Axum router over an already-constructed state.
#[must_use]
pub fn build_router(state: BookingsState) -> Router {
    Router::new()
        .route("/health", get(carpool_web::handlers::health::health_check))
        .route("/health/ready", get(handlers::readiness))
        .route("/api/v1/bookings", post(handlers::create_booking).get(handlers::list_bookings))
        .route("/api/v1/bookings/:id", get(handlers::get_booking))
        .route("/api/v1/bookings/:id/cancel", patch(handlers::cancel_booking))
        .layer(carpool_web::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
