//! HTTP surface for the search service.

use crate::domain::{LocationSearchQuery, PopularRoute, SearchTrip, TripSearchQuery, clamp_popular_routes_limit, is_valid_autocomplete_query};
use crate::state::SearchState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carpool_core::ids::TripId;
use carpool_web::handlers::health::{HealthCheck, HealthReporter, HealthStatus};
use carpool_web::AppError;
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /autocomplete`.
#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    /// The partial query the caller is typing.
    pub q: String,
    /// How many suggestions to return.
    pub limit: Option<i64>,
}

/// Query parameters for `GET /popular-routes`.
#[derive(Debug, Deserialize)]
pub struct PopularRoutesQuery {
    /// How many routes to return, clamped to the documented ceiling.
    pub limit: Option<i64>,
}

/// A city-pair suggestion returned by autocomplete.
#[derive(Debug, Serialize)]
pub struct RouteSuggestion {
    /// City name.
    pub city: String,
    /// Province or state.
    pub province: String,
}

/// `GET /health/ready` - reports `degraded` (not `unhealthy`) when the
/// search engine's circuit is open, since the primary-store fallback still
/// serves a strict subset of queries.
pub async fn readiness(State(state): State<SearchState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.check_health().await;
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// `GET /api/v1/search/trips` - the main multi-filter query, served by the
/// engine when it's up and falling back to the primary store otherwise.
///
/// # Errors
///
/// Returns a mapped [`AppError`] on query failure.
pub async fn search_trips(State(state): State<SearchState>, Query(query): Query<TripSearchQuery>) -> Result<Json<Vec<SearchTrip>>, AppError> {
    if let (Some(origin), Some(destination)) = (&query.origin_city, &query.destination_city) {
        if let Err(error) = state.repository.record_route_search(origin, destination).await {
            tracing::warn!(%error, "failed to record route search popularity");
        }
    }

    let trips = state.query_trips(&query).await.map_err(AppError::from_domain)?;
    Ok(Json(trips))
}

/// `GET /api/v1/search/location` - radius search over trip origins.
///
/// # Errors
///
/// Returns a mapped [`AppError`] on query failure.
pub async fn search_location(State(state): State<SearchState>, Query(query): Query<LocationSearchQuery>) -> Result<Json<Vec<SearchTrip>>, AppError> {
    let trips = state.repository.search_near(&query).await.map_err(AppError::from_domain)?;
    Ok(Json(trips))
}

/// `GET /api/v1/search/autocomplete` - city-pair suggestions for a partial
/// query, rejecting anything under the minimum length.
///
/// # Errors
///
/// Returns [`AppError::validation`] if `q` is shorter than the documented
/// minimum.
pub async fn autocomplete(State(state): State<SearchState>, Query(query): Query<AutocompleteQuery>) -> Result<Json<Vec<RouteSuggestion>>, AppError> {
    if !is_valid_autocomplete_query(&query.q) {
        return Err(AppError::validation("query must be at least 2 characters"));
    }

    let search = TripSearchQuery {
        q: Some(query.q),
        limit: query.limit,
        ..TripSearchQuery::default()
    };

    let trips = state.repository.search(&search).await.map_err(AppError::from_domain)?;

    let mut suggestions: Vec<RouteSuggestion> = Vec::new();
    for trip in trips {
        let suggestion = RouteSuggestion {
            city: trip.destination_city,
            province: trip.destination_province,
        };
        if !suggestions.iter().any(|existing: &RouteSuggestion| existing.city == suggestion.city && existing.province == suggestion.province) {
            suggestions.push(suggestion);
        }
    }

    Ok(Json(suggestions))
}

/// `GET /api/v1/search/popular-routes` - the most frequently searched city
/// pairs, most popular first.
///
/// # Errors
///
/// Returns a mapped [`AppError`] on query failure.
pub async fn popular_routes(State(state): State<SearchState>, Query(query): Query<PopularRoutesQuery>) -> Result<Json<Vec<PopularRoute>>, AppError> {
    let limit = clamp_popular_routes_limit(query.limit);
    let routes = state.repository.popular_routes(limit).await.map_err(AppError::from_domain)?;
    Ok(Json(routes))
}

/// `GET /api/v1/search/trips/:id` - a single denormalized document.
///
/// # Errors
///
/// Returns a mapped [`AppError`] if no document exists for that trip.
pub async fn get_search_trip(State(state): State<SearchState>, Path(id): Path<String>) -> Result<Json<SearchTrip>, AppError> {
    let trip = state.repository.find(&TripId::new(id)).await.map_err(AppError::from_domain)?;
    Ok(Json(trip))
}
