//! Advisory HTTP client for the trips service.
//!
//! `GET /api/v1/trips/:id` is read-only and used only to validate a booking
//! request before it's persisted and published; the authoritative
//! accept/reject decision happens inside the trips service's own seat
//! inventory compare-and-update. This client short-circuits requests that
//! could never succeed (unknown trip, wrong driver, not enough seats) but
//! its absence of a call never blocks the business effect - a booking whose
//! advisory read fails differently from the eventual reservation outcome
//! just surfaces a slightly less precise error to the caller.

use carpool_core::ids::{TripId, UserId};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// The subset of the trip record this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TripSummary {
    /// The trip's driver.
    pub driver_id: UserId,
    /// Current lifecycle status, e.g. `"published"`.
    pub status: String,
    /// Seats currently open for reservation.
    pub available_seats: i32,
    /// Price per seat, in cents.
    pub price_per_seat_cents: i64,
    /// Scheduled departure time, used to enforce the cancellation cutoff.
    pub departure_at: chrono::DateTime<chrono::Utc>,
}

/// Failures reading a trip from the trips service.
#[derive(Error, Debug)]
pub enum TripsClientError {
    /// No trip exists with the given id.
    #[error("trip not found")]
    NotFound,

    /// The request could not be completed.
    #[error("request to trips service failed: {0}")]
    Request(String),
}

/// Thin `reqwest`-backed client for the trips service's public read endpoint.
#[derive(Clone)]
pub struct TripsClient {
    http: reqwest::Client,
    base_url: String,
}

impl TripsClient {
    /// Build a client targeting `base_url` (e.g. `http://trips-service:8081`),
    /// with a bounded per-call timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch the trip summary needed to validate a booking request.
    ///
    /// # Errors
    ///
    /// Returns [`TripsClientError::NotFound`] for a 404, or
    /// [`TripsClientError::Request`] for any other transport or decode failure.
    pub async fn get_trip(&self, trip_id: &TripId) -> Result<TripSummary, TripsClientError> {
        let url = format!("{}/api/v1/trips/{}", self.base_url, trip_id.as_str());

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TripsClientError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TripsClientError::NotFound);
        }
        if !response.status().is_success() {
            return Err(TripsClientError::Request(format!("unexpected status {}", response.status())));
        }

        response
            .json::<TripSummary>()
            .await
            .map_err(|e| TripsClientError::Request(e.to_string()))
    }
}
