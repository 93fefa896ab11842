//! This service's concrete Axum state.

use crate::domain::TripSearchQuery;
use crate::error::SearchError;
use crate::events::Engine;
use crate::repository::SearchRepository;
use carpool_auth::TokenVerifier;
use carpool_web::extractors::HasTokenVerifier;
use carpool_web::handlers::health::{ComponentHealth, HealthCheck, HealthReporter};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state for every search service handler.
#[derive(Clone)]
pub struct SearchState {
    /// Primary-store projection repository.
    pub repository: SearchRepository,
    /// Raw pool, kept for the readiness check's own connectivity probe.
    pub pool: PgPool,
    /// Circuit-breaker-guarded search engine client, if one is configured.
    pub engine: Option<Arc<Engine>>,
    /// Bearer token verifier (the public read endpoints don't require
    /// auth, but the verifier is carried for consistency with every other
    /// service's state and any future authenticated endpoint).
    pub token_verifier: TokenVerifier,
}

impl SearchState {
    /// Run a trip search, preferring the engine and falling back to the
    /// primary store when it's unreachable or its circuit is open.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] if the fallback query itself fails.
    pub async fn query_trips(&self, query: &TripSearchQuery) -> Result<Vec<crate::domain::SearchTrip>, SearchError> {
        if let Some(engine) = &self.engine {
            let engine_query = crate::search_engine::EngineQuery {
                q: query.q.clone(),
                origin_city: query.origin_city.clone(),
                destination_city: query.destination_city.clone(),
                rows: query.limit(),
                start: (query.page() - 1) * query.limit(),
            };

            if let Ok(ids) = engine.query(&engine_query).await {
                let mut documents = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Ok(document) = self.repository.find(&carpool_core::ids::TripId::new(id)).await {
                        documents.push(document);
                    }
                }
                return Ok(documents);
            }
        }

        self.repository.search(query).await
    }
}

impl HasTokenVerifier for SearchState {
    fn token_verifier(&self) -> &TokenVerifier {
        &self.token_verifier
    }
}

#[axum::async_trait]
impl HealthReporter for SearchState {
    async fn check_health(&self) -> HealthCheck {
        let db_health = match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ComponentHealth::healthy("postgres"),
            Err(e) => ComponentHealth::unhealthy("postgres", e.to_string()),
        };

        let engine_health = match &self.engine {
            Some(engine) if engine.is_open() => ComponentHealth::degraded("solr", "circuit open, serving from primary store"),
            Some(_) => ComponentHealth::healthy("solr"),
            None => ComponentHealth::degraded("solr", "no search engine configured, serving from primary store"),
        };

        HealthCheck::from_components(vec![db_health, engine_health])
    }
}
