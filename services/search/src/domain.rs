//! The search projection's own types: the denormalized document, the
//! popular-route aggregate, and the query the read path parses.

use carpool_core::ids::{TripId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum length `q` must reach before autocomplete runs a query at all.
pub const MIN_AUTOCOMPLETE_QUERY_LEN: usize = 2;

/// Upper bound on how many routes `GET /popular-routes` will ever return.
pub const MAX_POPULAR_ROUTES_LIMIT: i64 = 50;

/// Default page size when a list query doesn't specify one.
pub const DEFAULT_LIMIT: i64 = 20;

/// The denormalized trip document this service serves queries from.
///
/// Mirrors a subset of the trips service's own record, with the driver's
/// name and rating embedded so a query never needs a second round trip.
/// Not authoritative - it may be rebuilt from the trip store at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchTrip {
    /// The trip this document projects.
    pub trip_id: TripId,
    /// The trip's driver.
    pub driver_id: UserId,
    /// Driver display name, embedded to avoid a join on read.
    pub driver_name: String,
    /// Driver's average rating at the time this document was last written.
    pub driver_rating: Option<f64>,
    /// Driver's lifetime trip count at the time this document was last written.
    pub driver_total_trips: i64,

    /// Origin city.
    pub origin_city: String,
    /// Origin province or state.
    pub origin_province: String,
    /// Origin latitude.
    pub origin_lat: f64,
    /// Origin longitude.
    pub origin_lng: f64,

    /// Destination city.
    pub destination_city: String,
    /// Destination province or state.
    pub destination_province: String,
    /// Destination latitude.
    pub destination_lat: f64,
    /// Destination longitude.
    pub destination_lng: f64,

    /// Scheduled departure.
    pub departure_at: DateTime<Utc>,
    /// Price per seat, in cents.
    pub price_per_seat_cents: i64,
    /// Seats currently open.
    pub available_seats: i32,

    /// Pets allowed.
    pub allows_pets: bool,
    /// Smoking allowed.
    pub allows_smoking: bool,
    /// Music/aux requests welcome.
    pub allows_music: bool,

    /// The trip's lifecycle status, carried as a string (this service
    /// doesn't need the trips service's own enum, just to filter on it).
    pub status: String,

    /// Concatenated free-text field the primary-store fallback matches
    /// against.
    pub search_text: String,
    /// A coarse ranking signal blending recency and query popularity.
    pub popularity_score: f64,
    /// The trip's optimistic-concurrency counter at the time this document
    /// was written; used to discard out-of-order projection updates.
    pub availability_version: i64,
    /// When this document was last written.
    pub updated_at: DateTime<Utc>,
}

impl SearchTrip {
    /// Build the field this service's primary-store fallback text-matches
    /// against.
    #[must_use]
    pub fn build_search_text(origin_city: &str, destination_city: &str, origin_province: &str, destination_province: &str, driver_name: &str) -> String {
        format!("{origin_city} {origin_province} {destination_city} {destination_province} {driver_name}").to_lowercase()
    }
}

/// A route's aggregate search popularity, kept so `GET /popular-routes` has
/// something to rank by beyond raw document count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularRoute {
    /// Origin city.
    pub origin_city: String,
    /// Destination city.
    pub destination_city: String,
    /// Cumulative number of searches that named this city pair.
    pub search_count: i64,
    /// Most recent time this pair was searched.
    pub last_searched_at: DateTime<Utc>,
}

/// Sort order for `GET /trips`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Earliest departure first.
    #[default]
    DepartureAsc,
    /// Cheapest first.
    PriceAsc,
    /// Most popular first.
    PopularityDesc,
}

/// A multi-filter query over the trip projection, parsed from query-string
/// parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripSearchQuery {
    /// Origin city, exact match.
    pub origin_city: Option<String>,
    /// Origin province, exact match.
    pub origin_province: Option<String>,
    /// Destination city, exact match.
    pub destination_city: Option<String>,
    /// Destination province, exact match.
    pub destination_province: Option<String>,
    /// A single departure date (matches any trip departing that UTC day).
    pub date: Option<chrono::NaiveDate>,
    /// Minimum seats required.
    pub min_seats: Option<i32>,
    /// Maximum price per seat, in cents.
    pub max_price_cents: Option<i64>,
    /// Require pets allowed.
    pub allows_pets: Option<bool>,
    /// Require smoking allowed.
    pub allows_smoking: Option<bool>,
    /// Require music allowed.
    pub allows_music: Option<bool>,
    /// Free-text query, matched against [`SearchTrip::search_text`].
    pub q: Option<String>,
    /// Requested sort order.
    #[serde(default)]
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size.
    pub limit: Option<i64>,
}

impl TripSearchQuery {
    /// The page number to use, floored at 1.
    #[must_use]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// The page size to use, floored at 1.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).max(1)
    }
}

/// A radius query over trip origin coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationSearchQuery {
    /// Latitude of the search center.
    pub lat: f64,
    /// Longitude of the search center.
    pub lng: f64,
    /// Search radius in kilometers.
    pub radius_km: f64,
    /// Page size.
    pub limit: Option<i64>,
}

impl LocationSearchQuery {
    /// The page size to use, floored at 1.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).max(1)
    }
}

/// Reject an autocomplete query that's too short to be useful, matching
/// the read path's documented minimum.
#[must_use]
pub fn is_valid_autocomplete_query(q: &str) -> bool {
    q.trim().chars().count() >= MIN_AUTOCOMPLETE_QUERY_LEN
}

/// Clamp a caller-supplied `limit` for `GET /popular-routes` to the
/// documented ceiling.
#[must_use]
pub fn clamp_popular_routes_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(10).clamp(1, MAX_POPULAR_ROUTES_LIMIT)
}

/// Haversine distance between two coordinates, in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autocomplete_query_below_minimum_length_is_rejected() {
        assert!(!is_valid_autocomplete_query("a"));
        assert!(!is_valid_autocomplete_query(" "));
    }

    #[test]
    fn autocomplete_query_at_minimum_length_is_accepted() {
        assert!(is_valid_autocomplete_query("to"));
    }

    #[test]
    fn popular_routes_limit_is_clamped_to_the_documented_ceiling() {
        assert_eq!(clamp_popular_routes_limit(Some(500)), MAX_POPULAR_ROUTES_LIMIT);
        assert_eq!(clamp_popular_routes_limit(Some(0)), 1);
        assert_eq!(clamp_popular_routes_limit(None), 10);
    }

    #[test]
    fn haversine_distance_between_a_point_and_itself_is_zero() {
        assert!(haversine_km(45.5, -73.6, 45.5, -73.6) < f64::EPSILON);
    }

    #[test]
    fn haversine_distance_is_symmetric() {
        let a = haversine_km(45.5, -73.6, 43.6, -79.4);
        let b = haversine_km(43.6, -79.4, 45.5, -73.6);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn search_text_is_lowercased_and_concatenates_the_route() {
        let text = SearchTrip::build_search_text("Montreal", "Toronto", "QC", "ON", "Alex");
        assert_eq!(text, "montreal qc toronto on alex");
    }
}
