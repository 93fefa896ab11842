//! Advisory HTTP client for the trips service: the source of truth this
//! service's projection writer denormalizes from.
//!
//! The projection consumer's own events are deliberately thin (a trip id
//! plus what changed), so after idempotency and version checks pass it
//! fetches the full record here before composing a search document.

use carpool_core::ids::{TripId, UserId};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// The subset of the trip record the projection writer denormalizes.
#[derive(Debug, Clone, Deserialize)]
pub struct TripDocument {
    /// The trip's driver.
    pub driver_id: UserId,
    /// Origin endpoint.
    pub origin: Endpoint,
    /// Destination endpoint.
    pub destination: Endpoint,
    /// Scheduled departure.
    pub departure_at: chrono::DateTime<chrono::Utc>,
    /// Price per seat, in cents.
    pub price_per_seat_cents: i64,
    /// Seats currently open.
    pub available_seats: i32,
    /// The trip's optimistic-concurrency counter.
    pub availability_version: i64,
    /// Ride preference flags.
    pub preferences: Preferences,
    /// Current lifecycle status.
    pub status: String,
}

/// A trip endpoint, as carried on the trips service's own wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    /// City name.
    pub city: String,
    /// Province or state.
    pub province: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

/// Ride preference flags, mirroring the trips service's own shape.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Preferences {
    /// Pets allowed.
    pub allows_pets: bool,
    /// Smoking allowed.
    pub allows_smoking: bool,
    /// Music/aux requests welcome.
    pub allows_music: bool,
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
    /// Build a client targeting `base_url`, with a bounded per-call timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch the trip fields the search projection denormalizes.
    ///
    /// # Errors
    ///
    /// Returns [`TripsClientError::NotFound`] for a 404, or
    /// [`TripsClientError::Request`] for any other transport or decode failure.
    pub async fn get_trip(&self, trip_id: &TripId) -> Result<TripDocument, TripsClientError> {
        let url = format!("{}/api/v1/trips/{}", self.base_url, trip_id.as_str());

        let response = self.http.get(&url).send().await.map_err(|e| TripsClientError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TripsClientError::NotFound);
        }
        if !response.status().is_success() {
            return Err(TripsClientError::Request(format!("unexpected status {}", response.status())));
        }

        response.json::<TripDocument>().await.map_err(|e| TripsClientError::Request(e.to_string()))
    }
}
