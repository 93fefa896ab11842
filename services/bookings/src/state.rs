//! This service's concrete Axum state.

use crate::repository::BookingRepository;
use crate::trips_client::TripsClient;
use carpool_auth::TokenVerifier;
use carpool_core::event_bus::EventBus;
use carpool_web::extractors::HasTokenVerifier;
use carpool_web::handlers::health::{ComponentHealth, HealthCheck, HealthReporter};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state for every bookings service handler.
#[derive(Clone)]
pub struct BookingsState {
    /// Booking repository.
    pub repository: BookingRepository,
    /// Handle used to publish booking lifecycle events.
    pub event_bus: Arc<dyn EventBus>,
    /// Raw pool, kept for the readiness check's own connectivity probe.
    pub pool: PgPool,
    /// Bearer token verifier.
    pub token_verifier: TokenVerifier,
    /// Advisory read client for the trips service.
    pub trips_client: TripsClient,
}

impl HasTokenVerifier for BookingsState {
    fn token_verifier(&self) -> &TokenVerifier {
        &self.token_verifier
    }
}

#[axum::async_trait]
impl HealthReporter for BookingsState {
    async fn check_health(&self) -> HealthCheck {
        let db_health = match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ComponentHealth::healthy("postgres"),
            Err(e) => ComponentHealth::unhealthy("postgres", e.to_string()),
        };

        HealthCheck::from_components(vec![db_health])
    }
}
