//! Advisory HTTP client for the users service, with a small in-memory cache
//! so denormalizing a burst of events for the same driver doesn't refetch
//! their profile on every one.

use carpool_core::ids::UserId;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// The subset of a user profile the search projection embeds.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverProfile {
    /// Display name.
    pub display_name: String,
    /// Derived average rating, `None` before the first rating lands.
    pub average_rating: Option<f64>,
    /// Completed trips as a driver.
    pub total_trips_as_driver: i64,
}

/// Failures reading a driver profile from the users service.
#[derive(Error, Debug)]
pub enum UsersClientError {
    /// No user exists with the given id.
    #[error("user not found")]
    NotFound,
    /// The request could not be completed.
    #[error("request to users service failed: {0}")]
    Request(String),
}

struct CacheEntry {
    profile: DriverProfile,
    fetched_at: Instant,
}

/// Thin `reqwest`-backed client for the users service's public profile
/// endpoint, fronted by a short-lived cache.
#[derive(Clone)]
pub struct UsersClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<DashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

impl UsersClient {
    /// Build a client targeting `base_url`, with a bounded per-call timeout
    /// and a cache entry lifetime of `cache_ttl`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration, cache_ttl: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            cache: Arc::new(DashMap::new()),
            cache_ttl,
        }
    }

    /// Fetch a driver's profile, serving a cached copy if it's younger than
    /// `cache_ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`UsersClientError::NotFound`] for a 404, or
    /// [`UsersClientError::Request`] for any other transport or decode failure.
    pub async fn get_profile(&self, user_id: &UserId) -> Result<DriverProfile, UsersClientError> {
        if let Some(entry) = self.cache.get(user_id.as_str()) {
            if entry.fetched_at.elapsed() < self.cache_ttl {
                return Ok(entry.profile.clone());
            }
        }

        let url = format!("{}/api/v1/users/{}", self.base_url, user_id.as_str());
        let response = self.http.get(&url).send().await.map_err(|e| UsersClientError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(UsersClientError::NotFound);
        }
        if !response.status().is_success() {
            return Err(UsersClientError::Request(format!("unexpected status {}", response.status())));
        }

        let profile = response.json::<DriverProfile>().await.map_err(|e| UsersClientError::Request(e.to_string()))?;

        self.cache.insert(
            user_id.as_str().to_string(),
            CacheEntry {
                profile: profile.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(profile)
    }
}
