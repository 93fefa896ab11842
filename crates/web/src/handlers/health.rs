//! Health check endpoints.
//!
//! Load balancers hit `/health` for bare liveness; orchestrators and the
//! on-call dashboard hit `/health/ready` for a real answer about whether
//! this instance's dependencies (database, event bus, search engine) are
//! actually usable.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operating, but with a non-fatal impairment (e.g. serving from the
    /// primary-store fallback because the search engine is unreachable).
    Degraded,
    /// Not usable.
    Unhealthy,
}

/// A single component's reported health, for inclusion in [`HealthCheck`].
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Name of the dependency, e.g. `"postgres"`, `"event_bus"`, `"search_engine"`.
    pub component: String,
    /// That dependency's status.
    pub status: HealthStatus,
    /// Optional human-readable detail (e.g. an error message).
    pub message: Option<String>,
}

impl ComponentHealth {
    /// Build a healthy component report.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    /// Build a degraded component report with an explanation.
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    /// Build an unhealthy component report with an explanation.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// The readiness response body: overall status plus a per-dependency breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// The worst status among `components` (unhealthy beats degraded beats healthy).
    pub status: HealthStatus,
    /// Individual dependency reports.
    pub components: Vec<ComponentHealth>,
}

impl HealthCheck {
    /// Roll a set of component reports up into an overall [`HealthCheck`].
    #[must_use]
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let status = if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self { status, components }
    }
}

/// Implemented by each service's Axum state so the shared readiness handler
/// can ask it to check its own dependencies.
#[axum::async_trait]
pub trait HealthReporter: Send + Sync + 'static {
    /// Check this instance's dependencies and report their health.
    async fn check_health(&self) -> HealthCheck;
}

/// Simple liveness endpoint.
///
/// Returns 200 OK if the process is running. Does not check dependencies -
/// see [`readiness`] for that.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness endpoint: reports per-dependency health via `State`.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
pub async fn readiness<S>(State(state): State<Arc<S>>) -> (StatusCode, Json<HealthCheck>)
where
    S: HealthReporter,
{
    let health = state.check_health().await;

    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHealthy;

    #[axum::async_trait]
    impl HealthReporter for AlwaysHealthy {
        async fn check_health(&self) -> HealthCheck {
            HealthCheck::from_components(vec![ComponentHealth::healthy("postgres")])
        }
    }

    struct SearchEngineDown;

    #[axum::async_trait]
    impl HealthReporter for SearchEngineDown {
        async fn check_health(&self) -> HealthCheck {
            HealthCheck::from_components(vec![
                ComponentHealth::healthy("postgres"),
                ComponentHealth::degraded("search_engine", "falling back to primary store"),
            ])
        }
    }

    #[tokio::test]
    async fn liveness_always_returns_ok() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn readiness_is_ok_when_all_components_healthy() {
        let state = Arc::new(AlwaysHealthy);
        let (status, Json(health)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn readiness_is_ok_but_degraded_when_a_component_is_degraded() {
        let state = Arc::new(SearchEngineDown);
        let (status, Json(health)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn unhealthy_component_yields_503() {
        struct Down;

        #[axum::async_trait]
        impl HealthReporter for Down {
            async fn check_health(&self) -> HealthCheck {
                HealthCheck::from_components(vec![ComponentHealth::unhealthy("postgres", "connection refused")])
            }
        }

        let state = Arc::new(Down);
        let (status, Json(health)) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }
}
