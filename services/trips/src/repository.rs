//! Postgres-backed seat inventory store.
//!
//! [`TripRepository::apply_reservation_delta`] is the correctness-critical
//! method: the atomic compare-and-update seat inventory depends on,
//! implemented as one `UPDATE ... WHERE ... RETURNING` round-trip so the
//! predicate and the mutation can never observe different snapshots of the
//! row.

use crate::domain::{CarDescriptor, Location, NewTrip, Preferences, Trip, TripPatch, TripStatus};
use crate::error::TripsError;
use carpool_core::ids::{TripId, UserId};
use carpool_core::optimistic::Version;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

/// Postgres-backed [`Trip`] store.
#[derive(Clone)]
pub struct TripRepository {
    pool: PgPool,
}

impl TripRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new, published trip with full availability.
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::Database`] if the insert fails.
    pub async fn create(&self, driver_id: &UserId, new_trip: NewTrip) -> Result<Trip, TripsError> {
        let id = TripId::generate();

        let row = sqlx::query(
            r"
            INSERT INTO trips (
                id, driver_id,
                origin_city, origin_province, origin_address, origin_lat, origin_lng,
                destination_city, destination_province, destination_address, destination_lat, destination_lng,
                departure_at, estimated_arrival_at, price_per_seat_cents,
                total_seats, reserved_seats, available_seats, availability_version,
                car_make, car_model, car_color, car_plate,
                allows_pets, allows_smoking, allows_music,
                status
            ) VALUES (
                $1, $2,
                $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12,
                $13, $14, $15,
                $16, 0, $16, 1,
                $17, $18, $19, $20,
                $21, $22, $23,
                'published'
            )
            RETURNING *
            ",
        )
        .bind(id.as_str())
        .bind(driver_id.as_str())
        .bind(&new_trip.origin.city)
        .bind(&new_trip.origin.province)
        .bind(&new_trip.origin.address)
        .bind(new_trip.origin.lat)
        .bind(new_trip.origin.lng)
        .bind(&new_trip.destination.city)
        .bind(&new_trip.destination.province)
        .bind(&new_trip.destination.address)
        .bind(new_trip.destination.lat)
        .bind(new_trip.destination.lng)
        .bind(new_trip.departure_at)
        .bind(new_trip.estimated_arrival_at)
        .bind(new_trip.price_per_seat_cents)
        .bind(new_trip.total_seats)
        .bind(&new_trip.car.make)
        .bind(&new_trip.car.model)
        .bind(&new_trip.car.color)
        .bind(&new_trip.car.plate)
        .bind(new_trip.preferences.allows_pets)
        .bind(new_trip.preferences.allows_smoking)
        .bind(new_trip.preferences.allows_music)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_trip(&row))
    }

    /// Look up a trip by id.
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::NotFound`] if no such trip exists, or
    /// [`TripsError::Database`] on query failure.
    pub async fn find(&self, id: &TripId) -> Result<Trip, TripsError> {
        let row = sqlx::query("SELECT * FROM trips WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_trip(&r)).ok_or_else(|| TripsError::NotFound(id.to_string()))
    }

    /// List trips, optionally filtered by driver and/or status, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::Database`] on query failure.
    pub async fn list(
        &self,
        driver_id: Option<&UserId>,
        status: Option<TripStatus>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Trip>, TripsError> {
        let offset = (page.max(1) - 1) * limit;
        let rows = sqlx::query(
            r"
            SELECT * FROM trips
            WHERE ($1::TEXT IS NULL OR driver_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY departure_at ASC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(driver_id.map(UserId::as_str))
        .bind(status.map(TripStatus::as_str))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_trip).collect())
    }

    /// Apply an owner-initiated patch. Caller has already checked ownership
    /// and run [`crate::domain::validate_update`].
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::Database`] on query failure.
    pub async fn update(&self, id: &TripId, patch: &TripPatch) -> Result<Trip, TripsError> {
        let current = self.find(id).await?;

        let departure_at = patch.departure_at.unwrap_or(current.departure_at);
        let estimated_arrival_at = patch.estimated_arrival_at.unwrap_or(current.estimated_arrival_at);
        let price_per_seat_cents = patch.price_per_seat_cents.unwrap_or(current.price_per_seat_cents);
        let total_seats = patch.total_seats.unwrap_or(current.total_seats);
        let prefs = patch.preferences.unwrap_or(current.preferences);

        let row = sqlx::query(
            r"
            UPDATE trips SET
                departure_at = $2,
                estimated_arrival_at = $3,
                price_per_seat_cents = $4,
                total_seats = $5,
                available_seats = $5 - reserved_seats,
                allows_pets = $6,
                allows_smoking = $7,
                allows_music = $8,
                availability_version = availability_version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id.as_str())
        .bind(departure_at)
        .bind(estimated_arrival_at)
        .bind(price_per_seat_cents)
        .bind(total_seats)
        .bind(prefs.allows_pets)
        .bind(prefs.allows_smoking)
        .bind(prefs.allows_music)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_trip(&row))
    }

    /// Cancel a trip. Caller has already checked ownership.
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::Database`] on query failure.
    pub async fn cancel(&self, id: &TripId, cancelled_by: &UserId, reason: &str) -> Result<Trip, TripsError> {
        let row = sqlx::query(
            r"
            UPDATE trips SET
                status = 'cancelled',
                cancelled_at = NOW(),
                cancelled_by = $2,
                cancellation_reason = $3,
                availability_version = availability_version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id.as_str())
        .bind(cancelled_by.as_str())
        .bind(reason)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_trip(&row))
    }

    /// The versioned compare-and-update that guards seat inventory.
    ///
    /// `delta` is negative for a reservation, positive for a release. For a
    /// negative delta the predicate additionally requires
    /// `available_seats >= |delta|`; for a positive delta that floor is
    /// dropped so a release can never fail for lack of capacity.
    ///
    /// Returns the updated trip on success. Zero matching rows - whether
    /// because the trip doesn't exist, the version has moved on, or there
    /// aren't enough seats - all collapse to [`TripsError::InventoryConflict`].
    ///
    /// # Errors
    ///
    /// Returns [`TripsError::InventoryConflict`] if the predicate matched no
    /// row, or [`TripsError::Database`] on query failure.
    pub async fn apply_reservation_delta(
        &self,
        trip_id: &TripId,
        delta: i32,
        expected_version: Version,
    ) -> Result<Trip, TripsError> {
        carpool_runtime::metrics::InventoryMetrics::record_attempt();

        let row = if delta < 0 {
            sqlx::query(
                r"
                UPDATE trips SET
                    available_seats = available_seats + $3,
                    reserved_seats = reserved_seats - $3,
                    availability_version = availability_version + 1,
                    status = CASE WHEN available_seats + $3 = 0 THEN 'full' ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                  AND availability_version = $2
                  AND available_seats >= $4
                RETURNING *
                ",
            )
            .bind(trip_id.as_str())
            .bind(expected_version.value())
            .bind(delta)
            .bind(-delta)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query(
                r"
                UPDATE trips SET
                    available_seats = available_seats + $3,
                    reserved_seats = reserved_seats - $3,
                    availability_version = availability_version + 1,
                    status = CASE WHEN status = 'full' AND available_seats + $3 > 0 THEN 'published' ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                  AND availability_version = $2
                RETURNING *
                ",
            )
            .bind(trip_id.as_str())
            .bind(expected_version.value())
            .bind(delta)
            .fetch_optional(&self.pool)
            .await?
        };

        match row {
            Some(row) => Ok(Self::row_to_trip(&row)),
            None => {
                carpool_runtime::metrics::InventoryMetrics::record_conflict();
                Err(TripsError::InventoryConflict)
            }
        }
    }

    fn row_to_trip(row: &PgRow) -> Trip {
        let status_str: String = row.get("status");
        Trip {
            id: TripId::new(row.get::<String, _>("id")),
            driver_id: UserId::new(row.get::<String, _>("driver_id")),
            origin: Location {
                city: row.get("origin_city"),
                province: row.get("origin_province"),
                address: row.get("origin_address"),
                lat: row.get("origin_lat"),
                lng: row.get("origin_lng"),
            },
            destination: Location {
                city: row.get("destination_city"),
                province: row.get("destination_province"),
                address: row.get("destination_address"),
                lat: row.get("destination_lat"),
                lng: row.get("destination_lng"),
            },
            departure_at: row.get::<DateTime<Utc>, _>("departure_at"),
            estimated_arrival_at: row.get::<DateTime<Utc>, _>("estimated_arrival_at"),
            price_per_seat_cents: row.get("price_per_seat_cents"),
            total_seats: row.get("total_seats"),
            reserved_seats: row.get("reserved_seats"),
            available_seats: row.get("available_seats"),
            availability_version: row.get("availability_version"),
            car: CarDescriptor {
                make: row.get("car_make"),
                model: row.get("car_model"),
                color: row.get("car_color"),
                plate: row.get("car_plate"),
            },
            preferences: Preferences {
                allows_pets: row.get("allows_pets"),
                allows_smoking: row.get("allows_smoking"),
                allows_music: row.get("allows_music"),
            },
            status: TripStatus::parse(&status_str).unwrap_or(TripStatus::Published),
            cancelled_at: row.get("cancelled_at"),
            cancelled_by: row.get::<Option<String>, _>("cancelled_by").map(UserId::new),
            cancellation_reason: row.get("cancellation_reason"),
        }
    }
}
