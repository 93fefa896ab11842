//! Postgres-backed projection store: the primary copy of every search
//! document, and the fallback query path used when the search engine is
//! unreachable.

use crate::domain::{LocationSearchQuery, PopularRoute, SearchTrip, SortOrder, TripSearchQuery, haversine_km};
use crate::error::SearchError;
use carpool_core::ids::{TripId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

/// Postgres-backed [`SearchTrip`] projection store.
#[derive(Clone)]
pub struct SearchRepository {
    pool: PgPool,
}

impl SearchRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write or overwrite a document, but only if `document.availability_version`
    /// is not older than what's already stored.
    ///
    /// Returns `true` if the write landed, `false` if it was discarded as
    /// stale - the caller uses this to decide whether to also push the
    /// document to the search engine.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn upsert_if_newer(&self, document: &SearchTrip) -> Result<bool, SearchError> {
        let result = sqlx::query(
            r"
            INSERT INTO search_trips (
                trip_id, driver_id, driver_name, driver_rating, driver_total_trips,
                origin_city, origin_province, origin_lat, origin_lng,
                destination_city, destination_province, destination_lat, destination_lng,
                departure_at, price_per_seat_cents, available_seats,
                allows_pets, allows_smoking, allows_music,
                status, search_text, popularity_score, availability_version, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11, $12, $13,
                $14, $15, $16,
                $17, $18, $19,
                $20, $21, $22, $23, NOW()
            )
            ON CONFLICT (trip_id) DO UPDATE SET
                driver_name = EXCLUDED.driver_name,
                driver_rating = EXCLUDED.driver_rating,
                driver_total_trips = EXCLUDED.driver_total_trips,
                origin_city = EXCLUDED.origin_city,
                origin_province = EXCLUDED.origin_province,
                origin_lat = EXCLUDED.origin_lat,
                origin_lng = EXCLUDED.origin_lng,
                destination_city = EXCLUDED.destination_city,
                destination_province = EXCLUDED.destination_province,
                destination_lat = EXCLUDED.destination_lat,
                destination_lng = EXCLUDED.destination_lng,
                departure_at = EXCLUDED.departure_at,
                price_per_seat_cents = EXCLUDED.price_per_seat_cents,
                available_seats = EXCLUDED.available_seats,
                allows_pets = EXCLUDED.allows_pets,
                allows_smoking = EXCLUDED.allows_smoking,
                allows_music = EXCLUDED.allows_music,
                status = EXCLUDED.status,
                search_text = EXCLUDED.search_text,
                popularity_score = EXCLUDED.popularity_score,
                availability_version = EXCLUDED.availability_version,
                updated_at = NOW()
            WHERE search_trips.availability_version < EXCLUDED.availability_version
            ",
        )
        .bind(document.trip_id.as_str())
        .bind(document.driver_id.as_str())
        .bind(&document.driver_name)
        .bind(document.driver_rating)
        .bind(document.driver_total_trips)
        .bind(&document.origin_city)
        .bind(&document.origin_province)
        .bind(document.origin_lat)
        .bind(document.origin_lng)
        .bind(&document.destination_city)
        .bind(&document.destination_province)
        .bind(document.destination_lat)
        .bind(document.destination_lng)
        .bind(document.departure_at)
        .bind(document.price_per_seat_cents)
        .bind(document.available_seats)
        .bind(document.allows_pets)
        .bind(document.allows_smoking)
        .bind(document.allows_music)
        .bind(&document.status)
        .bind(&document.search_text)
        .bind(document.popularity_score)
        .bind(document.availability_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove a document entirely (used when a trip is deleted outright;
    /// cancellations instead flow through `upsert_if_newer` with
    /// `status = "cancelled"` so the document stays queryable by id).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn delete(&self, trip_id: &TripId) -> Result<(), SearchError> {
        sqlx::query("DELETE FROM search_trips WHERE trip_id = $1").bind(trip_id.as_str()).execute(&self.pool).await?;
        Ok(())
    }

    /// Look up a single document by trip id.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NotFound`] if no document exists, or
    /// [`SearchError::Database`] on query failure.
    pub async fn find(&self, trip_id: &TripId) -> Result<SearchTrip, SearchError> {
        let row = sqlx::query("SELECT * FROM search_trips WHERE trip_id = $1")
            .bind(trip_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_document(&r)).ok_or_else(|| SearchError::NotFound(trip_id.to_string()))
    }

    /// The stored `availability_version` for a trip, if a document exists.
    /// Used by the projection consumer to decide whether an incoming event
    /// is stale before it even builds the full document.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn stored_version(&self, trip_id: &TripId) -> Result<Option<i64>, SearchError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT availability_version FROM search_trips WHERE trip_id = $1")
            .bind(trip_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Multi-filter city/date/price/preference query, the primary store's
    /// native capability and the query path's only option once the engine's
    /// circuit is open.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn search(&self, query: &TripSearchQuery) -> Result<Vec<SearchTrip>, SearchError> {
        let offset = (query.page() - 1) * query.limit();
        let order_by = match query.sort {
            SortOrder::DepartureAsc => "departure_at ASC",
            SortOrder::PriceAsc => "price_per_seat_cents ASC",
            SortOrder::PopularityDesc => "popularity_score DESC",
        };

        let sql = format!(
            r"
            SELECT * FROM search_trips
            WHERE status = 'published'
              AND ($1::TEXT IS NULL OR origin_city = $1)
              AND ($2::TEXT IS NULL OR origin_province = $2)
              AND ($3::TEXT IS NULL OR destination_city = $3)
              AND ($4::TEXT IS NULL OR destination_province = $4)
              AND ($5::DATE IS NULL OR departure_at::DATE = $5)
              AND ($6::INT IS NULL OR available_seats >= $6)
              AND ($7::BIGINT IS NULL OR price_per_seat_cents <= $7)
              AND ($8::BOOLEAN IS NULL OR allows_pets = $8)
              AND ($9::BOOLEAN IS NULL OR allows_smoking = $9)
              AND ($10::BOOLEAN IS NULL OR allows_music = $10)
              AND ($11::TEXT IS NULL OR search_text ILIKE '%' || $11 || '%')
            ORDER BY {order_by}
            LIMIT $12 OFFSET $13
            "
        );

        let rows = sqlx::query(&sql)
            .bind(&query.origin_city)
            .bind(&query.origin_province)
            .bind(&query.destination_city)
            .bind(&query.destination_province)
            .bind(query.date)
            .bind(query.min_seats)
            .bind(query.max_price_cents)
            .bind(query.allows_pets)
            .bind(query.allows_smoking)
            .bind(query.allows_music)
            .bind(query.q.as_ref().map(|q| q.to_lowercase()))
            .bind(query.limit())
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(Self::row_to_document).collect())
    }

    /// Radius query: pulls published trips near a city (a coarse
    /// bounding-box-free filter, fine at this scale) and then filters by
    /// the exact haversine distance in application code, since the fallback
    /// store has no native geospatial index.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn search_near(&self, query: &LocationSearchQuery) -> Result<Vec<SearchTrip>, SearchError> {
        let rows = sqlx::query(
            r"
            SELECT * FROM search_trips
            WHERE status = 'published'
            ORDER BY departure_at ASC
            LIMIT 500
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<SearchTrip> = rows
            .iter()
            .map(Self::row_to_document)
            .filter(|trip| haversine_km(query.lat, query.lng, trip.origin_lat, trip.origin_lng) <= query.radius_km)
            .collect();

        matches.truncate(query.limit() as usize);
        Ok(matches)
    }

    /// Record a search against a city pair, for the popular-routes ranking.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn record_route_search(&self, origin_city: &str, destination_city: &str) -> Result<(), SearchError> {
        sqlx::query(
            r"
            INSERT INTO popular_routes (origin_city, destination_city, search_count, last_searched_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (origin_city, destination_city) DO UPDATE SET
                search_count = popular_routes.search_count + 1,
                last_searched_at = NOW()
            ",
        )
        .bind(origin_city)
        .bind(destination_city)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The most frequently searched routes, most popular first.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Database`] on query failure.
    pub async fn popular_routes(&self, limit: i64) -> Result<Vec<PopularRoute>, SearchError> {
        let rows = sqlx::query(
            r"
            SELECT origin_city, destination_city, search_count, last_searched_at
            FROM popular_routes
            ORDER BY search_count DESC, last_searched_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PopularRoute {
                origin_city: row.get("origin_city"),
                destination_city: row.get("destination_city"),
                search_count: row.get("search_count"),
                last_searched_at: row.get::<DateTime<Utc>, _>("last_searched_at"),
            })
            .collect())
    }

    fn row_to_document(row: &PgRow) -> SearchTrip {
        SearchTrip {
            trip_id: TripId::new(row.get::<String, _>("trip_id")),
            driver_id: UserId::new(row.get::<String, _>("driver_id")),
            driver_name: row.get("driver_name"),
            driver_rating: row.get("driver_rating"),
            driver_total_trips: row.get("driver_total_trips"),
            origin_city: row.get("origin_city"),
            origin_province: row.get("origin_province"),
            origin_lat: row.get("origin_lat"),
            origin_lng: row.get("origin_lng"),
            destination_city: row.get("destination_city"),
            destination_province: row.get("destination_province"),
            destination_lat: row.get("destination_lat"),
            destination_lng: row.get("destination_lng"),
            departure_at: row.get::<DateTime<Utc>, _>("departure_at"),
            price_per_seat_cents: row.get("price_per_seat_cents"),
            available_seats: row.get("available_seats"),
            allows_pets: row.get("allows_pets"),
            allows_smoking: row.get("allows_smoking"),
            allows_music: row.get("allows_music"),
            status: row.get("status"),
            search_text: row.get("search_text"),
            popularity_score: row.get("popularity_score"),
            availability_version: row.get("availability_version"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        }
    }
}
