//! Trips service: authoritative seat inventory and trip lifecycle.
//!
//! Exposed as a library (in addition to the `trips-service` binary) so
//! integration tests can exercise [`repository::TripRepository`] and the
//! HTTP surface directly against a real database.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod handlers;
pub mod repository;
pub mod state;

use axum::routing::{get, patch, post, put};
use axum::Router;
use state::TripsState;
use tower_http::trace::TraceLayer;

/// Build the trips service's Axum router over an already-constructed state.
#[must_use]
pub fn build_router(state: TripsState) -> Router {
    Router::new()
        .route("/health", get(carpool_web::handlers::health::health_check))
        .route("/health/ready", get(handlers::readiness))
        .route("/api/v1/trips", post(handlers::create_trip).get(handlers::list_trips))
        .route("/api/v1/trips/:id", get(handlers::get_trip).put(handlers::update_trip))
        .route("/api/v1/trips/:id/cancel", patch(handlers::cancel_trip))
        .layer(carpool_web::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
