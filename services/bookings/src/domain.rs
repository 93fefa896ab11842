//! The booking aggregate and its state machine.

use carpool_core::ids::{BookingId, TripId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long before departure a passenger-initiated cancellation is refused.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 24;

/// A booking's position in its lifecycle.
///
/// ```text
///                reservation.confirmed
/// pending ──────────────────────────────► confirmed
///    │                                        │
///    │ reservation.failed          cancel(passenger, >=24h before departure)
///    ▼                                        ▼
///  failed                               cancelled
///                                             ▲
///                                       trip.cancelled
/// ```
/// `confirmed` additionally reaches `completed` out of band (trip
/// completion isn't modeled by an inbound event in this core). `cancelled`,
/// `failed` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Reservation requested, awaiting the trips service's outcome.
    Pending,
    /// Seats were reserved; the trip is booked.
    Confirmed,
    /// Cancelled by the passenger, or swept by a trip cancellation.
    Cancelled,
    /// The reservation could not be applied (no seats, or a lost race after retries).
    Failed,
    /// The trip has run its course.
    Completed,
}

impl BookingStatus {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    /// Parse a stored status string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::Completed)
    }
}

/// A booking record.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    /// Wire-visible booking id.
    pub id: BookingId,
    /// The trip being reserved against.
    pub trip_id: TripId,
    /// The passenger who requested the booking.
    pub passenger_id: UserId,
    /// The trip's driver, populated once `reservation.confirmed` lands.
    pub driver_id: Option<UserId>,
    /// Seats requested.
    pub seats_requested: i32,
    /// Total price in cents, populated on confirmation.
    pub total_price_cents: Option<i64>,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// When a cancellation (passenger- or driver-initiated) took effect.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Free-text cancellation reason.
    pub cancellation_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Input to create a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    /// The trip being reserved against.
    pub trip_id: TripId,
    /// Seats requested.
    pub seats_requested: i32,
}

/// Validate a booking request against the trip it targets.
///
/// `trip_driver_id` and `trip_status`/`trip_available_seats` come from an
/// advisory read of the trips service; the authoritative check happens
/// inside the seat inventory's compare-and-update, so this only rejects
/// requests that could never succeed.
///
/// # Errors
///
/// Returns a human-readable validation message.
pub fn validate_new_booking(
    new_booking: &NewBooking,
    passenger_id: &UserId,
    trip_driver_id: &UserId,
    trip_status: &str,
    trip_available_seats: i32,
) -> Result<(), String> {
    if new_booking.seats_requested < 1 {
        return Err("seats_requested must be at least 1".to_string());
    }
    if trip_driver_id == passenger_id {
        return Err("a driver cannot book their own trip".to_string());
    }
    if trip_status != "published" {
        return Err(format!("trip is not open for booking (status: {trip_status})"));
    }
    if trip_available_seats < new_booking.seats_requested {
        return Err("trip does not have enough available seats".to_string());
    }
    Ok(())
}

/// Whether a passenger-initiated cancellation this close to departure is refused.
#[must_use]
pub fn is_within_cancellation_cutoff(departure_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    departure_at - now < chrono::Duration::hours(CANCELLATION_CUTOFF_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Failed,
            BookingStatus::Completed,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn terminal_states_are_exactly_cancelled_failed_completed() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Failed.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
    }

    #[test]
    fn driver_cannot_book_own_trip() {
        let passenger = UserId::new("u-1");
        let new_booking = NewBooking {
            trip_id: TripId::new("t-1"),
            seats_requested: 1,
        };
        let err = validate_new_booking(&new_booking, &passenger, &passenger, "published", 4).unwrap_err();
        assert!(err.contains("own trip"));
    }

    #[test]
    fn rejects_seats_requested_below_one() {
        let new_booking = NewBooking {
            trip_id: TripId::new("t-1"),
            seats_requested: 0,
        };
        let err = validate_new_booking(
            &new_booking,
            &UserId::new("passenger"),
            &UserId::new("driver"),
            "published",
            4,
        )
        .unwrap_err();
        assert!(err.contains("seats_requested"));
    }

    #[test]
    fn rejects_trip_not_published() {
        let new_booking = NewBooking {
            trip_id: TripId::new("t-1"),
            seats_requested: 1,
        };
        let err = validate_new_booking(
            &new_booking,
            &UserId::new("passenger"),
            &UserId::new("driver"),
            "cancelled",
            4,
        )
        .unwrap_err();
        assert!(err.contains("not open for booking"));
    }

    #[test]
    fn rejects_insufficient_available_seats() {
        let new_booking = NewBooking {
            trip_id: TripId::new("t-1"),
            seats_requested: 3,
        };
        let err = validate_new_booking(
            &new_booking,
            &UserId::new("passenger"),
            &UserId::new("driver"),
            "published",
            2,
        )
        .unwrap_err();
        assert!(err.contains("enough available seats"));
    }

    #[test]
    fn cancellation_cutoff_rejects_departures_within_24h() {
        let now = Utc::now();
        assert!(is_within_cancellation_cutoff(now + chrono::Duration::hours(5), now));
        assert!(!is_within_cancellation_cutoff(now + chrono::Duration::hours(48), now));
    }
}
