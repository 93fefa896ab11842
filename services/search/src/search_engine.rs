//! A Solr-compatible search engine client, guarded by a circuit breaker so a
//! down engine fails fast instead of adding latency to every query.

use crate::domain::SearchTrip;
use carpool_runtime::circuit_breaker::{CircuitBreaker, Either};
use carpool_runtime::metrics::SearchEngineMetrics;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the search engine.
#[derive(Error, Debug, Clone)]
pub enum SearchEngineError {
    /// The HTTP call itself failed (network, timeout, non-2xx).
    #[error("search engine request failed: {0}")]
    Request(String),
    /// The engine rejected a document or query (schema mismatch, bad syntax).
    #[error("search engine rejected the request: {0}")]
    Rejected(String),
}

/// A query this service can forward to the search engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineQuery {
    /// Free-text query term, if any.
    pub q: Option<String>,
    /// Origin city filter.
    pub origin_city: Option<String>,
    /// Destination city filter.
    pub destination_city: Option<String>,
    /// Page size.
    pub rows: i64,
    /// Zero-based offset.
    pub start: i64,
}

/// Behavior a Solr-like document index exposes to this service.
///
/// Abstracted behind a trait so the projection writer and the query path can
/// be tested against a fake without a running engine.
#[axum::async_trait]
pub trait SearchEngine: Send + Sync {
    /// Upsert a document, replacing any existing one with the same trip id.
    async fn index(&self, document: &SearchTrip) -> Result<(), SearchEngineError>;

    /// Remove a document (a cancelled or expired trip falling out of the
    /// searchable set).
    async fn delete(&self, trip_id: &str) -> Result<(), SearchEngineError>;

    /// Run a query, returning matching trip ids in ranked order.
    async fn query(&self, query: &EngineQuery) -> Result<Vec<String>, SearchEngineError>;
}

/// A `reqwest`-backed client for a Solr-compatible HTTP index.
pub struct SolrSearchEngine {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl SolrSearchEngine {
    /// Build a client pointed at `base_url` (e.g. `http://localhost:8983/solr`)
    /// and a named `collection`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            collection: collection.into(),
        }
    }
}

#[axum::async_trait]
impl SearchEngine for SolrSearchEngine {
    async fn index(&self, document: &SearchTrip) -> Result<(), SearchEngineError> {
        let url = format!("{}/{}/update/json/docs?commit=true", self.base_url, self.collection);
        let response = self
            .client
            .post(&url)
            .json(document)
            .send()
            .await
            .map_err(|e| SearchEngineError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchEngineError::Rejected(response.status().to_string()))
        }
    }

    async fn delete(&self, trip_id: &str) -> Result<(), SearchEngineError> {
        let url = format!("{}/{}/update?commit=true", self.base_url, self.collection);
        let body = serde_json::json!({ "delete": { "id": trip_id } });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchEngineError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchEngineError::Rejected(response.status().to_string()))
        }
    }

    async fn query(&self, query: &EngineQuery) -> Result<Vec<String>, SearchEngineError> {
        let url = format!("{}/{}/select", self.base_url, self.collection);
        let response = self
            .client
            .get(&url)
            .query(&[("rows", query.rows.to_string()), ("start", query.start.to_string())])
            .query(&[("q", query.q.clone().unwrap_or_else(|| "*:*".to_string()))])
            .send()
            .await
            .map_err(|e| SearchEngineError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchEngineError::Rejected(response.status().to_string()));
        }

        let body: SolrResponse = response.json().await.map_err(|e| SearchEngineError::Request(e.to_string()))?;
        Ok(body.response.docs.into_iter().map(|doc| doc.id).collect())
    }
}

#[derive(Debug, serde::Deserialize)]
struct SolrResponse {
    response: SolrDocs,
}

#[derive(Debug, serde::Deserialize)]
struct SolrDocs {
    docs: Vec<SolrDoc>,
}

#[derive(Debug, serde::Deserialize)]
struct SolrDoc {
    #[serde(rename = "trip_id")]
    id: String,
}

/// Wraps any [`SearchEngine`] with a [`CircuitBreaker`] so repeated
/// failures stop adding latency to the read path and callers fall back to
/// the primary store instead.
pub struct GuardedSearchEngine<E> {
    inner: E,
    breaker: CircuitBreaker,
}

impl<E: SearchEngine> GuardedSearchEngine<E> {
    /// Wrap `inner` with `breaker`.
    #[must_use]
    pub const fn new(inner: E, breaker: CircuitBreaker) -> Self {
        Self { inner, breaker }
    }

    /// Whether the breaker currently considers the engine unavailable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.breaker.state(), carpool_runtime::circuit_breaker::CircuitState::Open)
    }

    /// Index a document through the breaker. A rejection due to an open
    /// circuit is folded into [`SearchEngineError::Request`] since callers
    /// treat every failure here identically (non-fatal, logged, retried on
    /// the next update).
    pub async fn index(&self, document: &SearchTrip) -> Result<(), SearchEngineError> {
        self.breaker
            .call(|| self.inner.index(document))
            .await
            .map_err(Self::flatten)
    }

    /// Delete a document through the breaker.
    pub async fn delete(&self, trip_id: &str) -> Result<(), SearchEngineError> {
        self.breaker.call(|| self.inner.delete(trip_id)).await.map_err(Self::flatten)
    }

    /// Run a query through the breaker, recording whether it went to the
    /// engine or had to fall back.
    pub async fn query(&self, query: &EngineQuery) -> Result<Vec<String>, SearchEngineError> {
        SearchEngineMetrics::record_query();
        match self.breaker.call(|| self.inner.query(query)).await {
            Ok(ids) => Ok(ids),
            Err(error) => {
                SearchEngineMetrics::record_fallback();
                Err(Self::flatten(error))
            }
        }
    }

    fn flatten(error: Either<carpool_runtime::circuit_breaker::CircuitBreakerError, SearchEngineError>) -> SearchEngineError {
        match error {
            Either::Left(breaker) => SearchEngineError::Request(breaker.to_string()),
            Either::Right(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchTrip;
    use carpool_core::ids::{TripId, UserId};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyEngine {
        failures_remaining: Arc<AtomicUsize>,
    }

    #[axum::async_trait]
    impl SearchEngine for FlakyEngine {
        async fn index(&self, _document: &SearchTrip) -> Result<(), SearchEngineError> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                Err(SearchEngineError::Request("down".to_string()))
            } else {
                Ok(())
            }
        }

        async fn delete(&self, _trip_id: &str) -> Result<(), SearchEngineError> {
            Ok(())
        }

        async fn query(&self, _query: &EngineQuery) -> Result<Vec<String>, SearchEngineError> {
            Ok(vec![])
        }
    }

    fn sample_document() -> SearchTrip {
        SearchTrip {
            trip_id: TripId::new("t-1"),
            driver_id: UserId::new("d-1"),
            driver_name: "Alex".to_string(),
            driver_rating: Some(4.5),
            driver_total_trips: 10,
            origin_city: "Montreal".to_string(),
            origin_province: "QC".to_string(),
            origin_lat: 45.5,
            origin_lng: -73.6,
            destination_city: "Toronto".to_string(),
            destination_province: "ON".to_string(),
            destination_lat: 43.6,
            destination_lng: -79.4,
            departure_at: Utc::now(),
            price_per_seat_cents: 2500,
            available_seats: 3,
            allows_pets: false,
            allows_smoking: false,
            allows_music: true,
            status: "published".to_string(),
            search_text: "montreal qc toronto on alex".to_string(),
            popularity_score: 0.0,
            availability_version: 1,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_failures_and_rejects_fast() {
        let engine = FlakyEngine {
            failures_remaining: Arc::new(AtomicUsize::new(10)),
        };
        let breaker = CircuitBreaker::new().with_failure_threshold(2).with_timeout(Duration::from_secs(60));
        let guarded = GuardedSearchEngine::new(engine, breaker);

        assert!(guarded.index(&sample_document()).await.is_err());
        assert!(guarded.index(&sample_document()).await.is_err());
        assert!(guarded.is_open());

        let result = guarded.index(&sample_document()).await;
        assert!(result.is_err());
    }
}
