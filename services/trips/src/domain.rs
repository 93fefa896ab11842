//! Trip domain types and the pure validation rules around them.
//!
//! Kept free of I/O so the invariants in these constructors can be property
//! tested without a database.

use carpool_core::ids::{TripId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic endpoint: a human-readable address plus coordinates for the
/// search service's radius queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// City name.
    pub city: String,
    /// Province or state.
    pub province: String,
    /// Free-text street address.
    pub address: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

/// Identifying details of the vehicle making the trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarDescriptor {
    /// Manufacturer, e.g. "Toyota".
    pub make: String,
    /// Model, e.g. "Corolla".
    pub model: String,
    /// Color, for passenger pickup identification.
    pub color: String,
    /// License plate.
    pub plate: String,
}

/// Ride preference flags a driver advertises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Preferences {
    /// Pets are allowed in the car.
    pub allows_pets: bool,
    /// Smoking is allowed in the car.
    pub allows_smoking: bool,
    /// The driver is fine with music/aux requests.
    pub allows_music: bool,
}

/// A trip's place in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    /// Created but not yet published (reserved for future use; `CreateTrip`
    /// publishes directly into `Published` today).
    Draft,
    /// Open for reservations.
    Published,
    /// No seats remaining.
    Full,
    /// Departure time has passed and the trip is underway.
    InProgress,
    /// The trip has concluded.
    Completed,
    /// Cancelled by the driver.
    Cancelled,
}

impl TripStatus {
    /// The string stored in the `status` column and carried on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Full => "full",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a status string loaded from storage.
    ///
    /// # Errors
    ///
    /// Returns the raw string back as `Err` if it isn't a known status.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "full" => Ok(Self::Full),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(other.to_string()),
        }
    }

    /// Whether the trip can still be mutated by its owner or cancelled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// The authoritative trip record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Stable id.
    pub id: TripId,
    /// The driver who owns this trip.
    pub driver_id: UserId,
    /// Pickup location.
    pub origin: Location,
    /// Drop-off location.
    pub destination: Location,
    /// Scheduled departure time.
    pub departure_at: DateTime<Utc>,
    /// Estimated arrival time.
    pub estimated_arrival_at: DateTime<Utc>,
    /// Price per seat, in cents (avoids floating point money).
    pub price_per_seat_cents: i64,
    /// Total seats offered at creation.
    pub total_seats: i32,
    /// Seats currently held by confirmed bookings.
    pub reserved_seats: i32,
    /// Seats still open for reservation.
    pub available_seats: i32,
    /// Optimistic concurrency version; incremented on every mutation.
    pub availability_version: i64,
    /// Vehicle details.
    pub car: CarDescriptor,
    /// Ride preferences.
    pub preferences: Preferences,
    /// Lifecycle status.
    pub status: TripStatus,
    /// When the trip was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Who cancelled it (always the driver today).
    pub cancelled_by: Option<UserId>,
    /// Free-text cancellation reason.
    pub cancellation_reason: Option<String>,
}

/// Input to [`crate::repository::TripRepository::create`], validated before
/// any row is written.
#[derive(Debug, Clone)]
pub struct NewTrip {
    /// Pickup location.
    pub origin: Location,
    /// Drop-off location.
    pub destination: Location,
    /// Scheduled departure time.
    pub departure_at: DateTime<Utc>,
    /// Estimated arrival time.
    pub estimated_arrival_at: DateTime<Utc>,
    /// Price per seat, in cents.
    pub price_per_seat_cents: i64,
    /// Seats offered.
    pub total_seats: i32,
    /// Vehicle details.
    pub car: CarDescriptor,
    /// Ride preferences.
    pub preferences: Preferences,
}

/// Validate a [`NewTrip`] against the creation invariants: 1-8 seats,
/// departure strictly in the future, a non-negative price.
///
/// # Errors
///
/// Returns a human-readable validation message on the first rule violated.
pub fn validate_new_trip(new_trip: &NewTrip, now: DateTime<Utc>) -> Result<(), String> {
    if !(1..=8).contains(&new_trip.total_seats) {
        return Err(format!("total_seats must be between 1 and 8, got {}", new_trip.total_seats));
    }
    if new_trip.departure_at <= now {
        return Err("departure_at must be strictly in the future".to_string());
    }
    if new_trip.estimated_arrival_at <= new_trip.departure_at {
        return Err("estimated_arrival_at must be after departure_at".to_string());
    }
    if new_trip.price_per_seat_cents < 0 {
        return Err("price_per_seat_cents cannot be negative".to_string());
    }
    Ok(())
}

/// A patch to an existing trip's mutable fields, applied by `UpdateTrip`.
#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    /// New departure time, if changing.
    pub departure_at: Option<DateTime<Utc>>,
    /// New estimated arrival time, if changing.
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    /// New price per seat, if changing.
    pub price_per_seat_cents: Option<i64>,
    /// New total seat count, if changing.
    pub total_seats: Option<i32>,
    /// New ride preferences, if changing.
    pub preferences: Option<Preferences>,
}

/// Validate an update against a trip's current state: forbidden once any
/// seat is reserved, and `total_seats` cannot drop below `reserved_seats`.
///
/// # Errors
///
/// Returns a human-readable validation message on the first rule violated.
pub fn validate_update(trip: &Trip, patch: &TripPatch) -> Result<(), String> {
    if trip.reserved_seats > 0 {
        return Err("cannot update a trip with active reservations".to_string());
    }
    if let Some(new_total) = patch.total_seats {
        if !(1..=8).contains(&new_total) {
            return Err(format!("total_seats must be between 1 and 8, got {new_total}"));
        }
        if new_total < trip.reserved_seats {
            return Err("total_seats cannot drop below reserved_seats".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_new_trip(now: DateTime<Utc>, total_seats: i32) -> NewTrip {
        NewTrip {
            origin: Location {
                city: "Montreal".into(),
                province: "QC".into(),
                address: "123 Rue Sainte-Catherine".into(),
                lat: 45.5017,
                lng: -73.5673,
            },
            destination: Location {
                city: "Quebec City".into(),
                province: "QC".into(),
                address: "456 Rue Saint-Jean".into(),
                lat: 46.8139,
                lng: -71.2080,
            },
            departure_at: now + Duration::hours(2),
            estimated_arrival_at: now + Duration::hours(5),
            price_per_seat_cents: 2500,
            total_seats,
            car: CarDescriptor {
                make: "Toyota".into(),
                model: "Corolla".into(),
                color: "Blue".into(),
                plate: "ABC123".into(),
            },
            preferences: Preferences::default(),
        }
    }

    #[test]
    fn rejects_seat_count_out_of_range() {
        let now = Utc::now();
        assert!(validate_new_trip(&sample_new_trip(now, 0), now).is_err());
        assert!(validate_new_trip(&sample_new_trip(now, 9), now).is_err());
        assert!(validate_new_trip(&sample_new_trip(now, 4), now).is_ok());
    }

    #[test]
    fn rejects_departure_in_the_past() {
        let now = Utc::now();
        let mut trip = sample_new_trip(now, 4);
        trip.departure_at = now - Duration::hours(1);
        assert!(validate_new_trip(&trip, now).is_err());
    }

    #[test]
    fn rejects_arrival_before_departure() {
        let now = Utc::now();
        let mut trip = sample_new_trip(now, 4);
        trip.estimated_arrival_at = trip.departure_at - Duration::minutes(1);
        assert!(validate_new_trip(&trip, now).is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TripStatus::Draft,
            TripStatus::Published,
            TripStatus::Full,
            TripStatus::InProgress,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            assert_eq!(TripStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn update_forbidden_once_seats_reserved() {
        let now = Utc::now();
        let trip = Trip {
            id: TripId::generate(),
            driver_id: UserId::generate(),
            origin: sample_new_trip(now, 4).origin,
            destination: sample_new_trip(now, 4).destination,
            departure_at: now + Duration::hours(2),
            estimated_arrival_at: now + Duration::hours(5),
            price_per_seat_cents: 2500,
            total_seats: 4,
            reserved_seats: 1,
            available_seats: 3,
            availability_version: 2,
            car: sample_new_trip(now, 4).car,
            preferences: Preferences::default(),
            status: TripStatus::Published,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
        };
        let patch = TripPatch {
            total_seats: Some(5),
            ..Default::default()
        };
        assert!(validate_update(&trip, &patch).is_err());
    }
}
