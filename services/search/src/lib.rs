//! Search service: a denormalized, eventually-consistent read model over
//! trip listings, with a search-engine-backed query path that falls back to
//! the primary store when the engine is unreachable.
//!
//! Exposed as a library (in addition to the `search-service` binary) so
//! integration tests can exercise [`repository::SearchRepository`] and the
//! HTTP surface directly against a real database.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod handlers;
pub mod repository;
pub mod search_engine;
pub mod state;
pub mod trips_client;
pub mod users_client;

use axum::routing::get;
use axum::Router;
use state::SearchState;
use tower_http::trace::TraceLayer;

/// Build the search service's Axum router over an already-constructed state.
#[must_use]
pub fn build_router(state: SearchState) -> Router {
    Router::new()
        .route("/health", get(carpool_web::handlers::health::health_check))
        .route("/health/ready", get(handlers::readiness))
        .route("/api/v1/search/trips", get(handlers::search_trips))
        .route("/api/v1/search/location", get(handlers::search_location))
        .route("/api/v1/search/autocomplete", get(handlers::autocomplete))
        .route("/api/v1/search/popular-routes", get(handlers::popular_routes))
        .route("/api/v1/search/trips/:id", get(handlers::get_search_trip))
        .layer(carpool_web::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
