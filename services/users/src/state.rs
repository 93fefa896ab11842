//! This service's concrete Axum state.

use crate::repository::UserRepository;
use carpool_auth::{TokenIssuer, TokenVerifier};
use carpool_web::extractors::HasTokenVerifier;
use carpool_web::handlers::health::{ComponentHealth, HealthCheck, HealthReporter};
use sqlx::PgPool;

/// Shared state for every users service handler.
#[derive(Clone)]
pub struct UsersState {
    /// User repository.
    pub repository: UserRepository,
    /// Raw pool, kept for the readiness check's own connectivity probe.
    pub pool: PgPool,
    /// Issues bearer tokens at registration and login.
    pub token_issuer: TokenIssuer,
    /// Verifies bearer tokens, same as every other service.
    pub token_verifier: TokenVerifier,
}

impl HasTokenVerifier for UsersState {
    fn token_verifier(&self) -> &TokenVerifier {
        &self.token_verifier
    }
}

#[axum::async_trait]
impl HealthReporter for UsersState {
    async fn check_health(&self) -> HealthCheck {
        let db_health = match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ComponentHealth::healthy("postgres"),
            Err(e) => ComponentHealth::unhealthy("postgres", e.to_string()),
        };

        HealthCheck::from_components(vec![db_health])
    }
}
