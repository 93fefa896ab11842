//! Users service: registration, login, profile lookup and the rating
//! aggregate other services denormalize.
//!
//! Exposed as a library (in addition to the `users-service` binary) so
//! integration tests can exercise [`repository::UserRepository`] and the
//! HTTP surface directly against a real database.

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod password;
pub mod repository;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use state::UsersState;
use tower_http::trace::TraceLayer;

/// Build the users service's Axum router over an already-constructed state.
#[must_use]
pub fn build_router(state: UsersState) -> Router {
    Router::new()
        .route("/health", get(carpool_web::handlers::health::health_check))
        .route("/health/ready", get(handlers::readiness))
        .route("/api/v1/users/register", post(handlers::register))
        .route("/api/v1/users/login", post(handlers::login))
        .route("/api/v1/users/me", get(handlers::get_me))
        .route("/api/v1/users/:id", get(handlers::get_profile))
        .route("/api/v1/users/:id/ratings", post(handlers::rate_user))
        .layer(carpool_web::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
