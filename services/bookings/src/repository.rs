//! Postgres-backed booking store.

use crate::domain::{Booking, BookingStatus, NewBooking};
use crate::error::BookingsError;
use carpool_core::ids::{BookingId, TripId, UserId};
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Repository over the `bookings` table.
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::DuplicateBooking`] if a non-terminal booking
    /// already exists for this (trip, passenger) pair - the unique partial
    /// index is what actually enforces this, this just maps the violation.
    pub async fn create(&self, passenger_id: &UserId, new_booking: NewBooking) -> Result<Booking, BookingsError> {
        let id = BookingId::generate();
        let now = Utc::now();

        let row = sqlx::query(
            r"
            INSERT INTO bookings (id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                                   status, cancelled_at, cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, NULL, $4, NULL, 'pending', NULL, NULL, $5, $5)
            RETURNING id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                      status, cancelled_at, cancellation_reason, created_at, updated_at
            ",
        )
        .bind(id.as_str())
        .bind(new_booking.trip_id.as_str())
        .bind(passenger_id.as_str())
        .bind(new_booking.seats_requested)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => BookingsError::DuplicateBooking,
            other => BookingsError::Database(other),
        })?;

        Ok(Self::row_to_booking(&row))
    }

    /// Look up a booking by id.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::NotFound`] if no such booking exists.
    pub async fn find(&self, id: &BookingId) -> Result<Booking, BookingsError> {
        let row = sqlx::query(
            r"
            SELECT id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                   status, cancelled_at, cancellation_reason, created_at, updated_at
            FROM bookings WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BookingsError::NotFound(id.to_string()))?;

        Ok(Self::row_to_booking(&row))
    }

    /// Look up a booking by the trip and event-driven identifiers the
    /// reservation consumer operates on (no ownership check - that's the
    /// HTTP layer's job).
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::NotFound`] if no such booking exists.
    pub async fn find_opt(&self, id: &BookingId) -> Result<Option<Booking>, BookingsError> {
        let row = sqlx::query(
            r"
            SELECT id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                   status, cancelled_at, cancellation_reason, created_at, updated_at
            FROM bookings WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Self::row_to_booking(&row)))
    }

    /// Paginated list of a passenger's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::Database`] on query failure.
    pub async fn list_for_passenger(&self, passenger_id: &UserId, page: i64, limit: i64) -> Result<Vec<Booking>, BookingsError> {
        let offset = (page.max(1) - 1) * limit.max(1);

        let rows = sqlx::query(
            r"
            SELECT id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                   status, cancelled_at, cancellation_reason, created_at, updated_at
            FROM bookings
            WHERE passenger_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(passenger_id.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_booking).collect())
    }

    /// Transition `pending → confirmed`, populating `driver_id` and
    /// `total_price_cents`. A no-op (other than returning the current row)
    /// if the booking is already confirmed, so redelivery of
    /// `reservation.confirmed` is harmless even without the idempotency
    /// ledger.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::Database`] on query failure.
    pub async fn confirm(&self, id: &BookingId, driver_id: &UserId, total_price_cents: i64) -> Result<(), BookingsError> {
        sqlx::query(
            r"
            UPDATE bookings
            SET status = 'confirmed', driver_id = $2, total_price_cents = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id.as_str())
        .bind(driver_id.as_str())
        .bind(total_price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Transition `pending → failed`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::Database`] on query failure.
    pub async fn fail(&self, id: &BookingId, reason: &str) -> Result<(), BookingsError> {
        sqlx::query(
            r"
            UPDATE bookings
            SET status = 'failed', cancellation_reason = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id.as_str())
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Transition to `cancelled`, recording who/why.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::TerminalState`] if the booking is already
    /// in a terminal state.
    pub async fn cancel(&self, id: &BookingId, reason: &str) -> Result<Booking, BookingsError> {
        let row = sqlx::query(
            r"
            UPDATE bookings
            SET status = 'cancelled', cancelled_at = $2, cancellation_reason = $3, updated_at = $2
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING id, trip_id, passenger_id, driver_id, seats_requested, total_price_cents,
                      status, cancelled_at, cancellation_reason, created_at, updated_at
            ",
        )
        .bind(id.as_str())
        .bind(Utc::now())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookingsError::TerminalState)?;

        Ok(Self::row_to_booking(&row))
    }

    /// Cancel every non-terminal booking on a trip in one statement, as a
    /// response to `trip.cancelled`. Returns the ids that were actually
    /// transitioned, for event logging.
    ///
    /// # Errors
    ///
    /// Returns [`BookingsError::Database`] on query failure.
    pub async fn cancel_all_for_trip(&self, trip_id: &TripId, reason: &str) -> Result<Vec<BookingId>, BookingsError> {
        let rows = sqlx::query(
            r"
            UPDATE bookings
            SET status = 'cancelled', cancelled_at = $2, cancellation_reason = $3, updated_at = $2
            WHERE trip_id = $1 AND status IN ('pending', 'confirmed')
            RETURNING id
            ",
        )
        .bind(trip_id.as_str())
        .bind(Utc::now())
        .bind(reason)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| BookingId::new(row.get::<String, _>("id"))).collect())
    }

    fn row_to_booking(row: &PgRow) -> Booking {
        Booking {
            id: BookingId::new(row.get::<String, _>("id")),
            trip_id: TripId::new(row.get::<String, _>("trip_id")),
            passenger_id: UserId::new(row.get::<String, _>("passenger_id")),
            driver_id: row.get::<Option<String>, _>("driver_id").map(UserId::new),
            seats_requested: row.get("seats_requested"),
            total_price_cents: row.get("total_price_cents"),
            status: BookingStatus::parse(row.get::<&str, _>("status"))
                .expect("status column constrained to known values"),
            cancelled_at: row.get("cancelled_at"),
            cancellation_reason: row.get("cancellation_reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
