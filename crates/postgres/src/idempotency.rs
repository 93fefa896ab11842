//! The processed-events ledger: the correctness primitive behind
//! at-least-once bus consumption.
//!
//! Every consumer - the trips service applying `booking.created`, the search
//! service applying `trip.created` - calls [`IdempotencyLedger::try_record`]
//! before doing anything else with an incoming message. The table's unique
//! constraint on `event_id` is what actually enforces "process each event
//! exactly once despite at-least-once delivery": a concurrent duplicate
//! delivery loses the `INSERT ... ON CONFLICT DO NOTHING` race and is told to
//! skip, rather than the application coordinating via a read-then-write that
//! could itself race.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

/// Failures from ledger operations.
#[derive(Error, Debug)]
pub enum IdempotencyError {
    /// The underlying query failed.
    #[error("idempotency ledger query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// A previously recorded ledger entry, returned for inspection/audit.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    /// The producer-assigned event id.
    pub event_id: String,
    /// The event type recorded at processing time (for audit/debugging).
    pub event_type: String,
    /// Which consumer recorded this entry (e.g. `"trips.reservation_consumer"`).
    pub consumer: String,
    /// When this event was first recorded as processed.
    pub processed_at: DateTime<Utc>,
}

/// Postgres-backed idempotency ledger.
///
/// One ledger table is shared per consumer group: the `consumer` column
/// namespaces entries so the same `event_id` can be independently tracked
/// by, say, the trips service's reservation consumer and the search
/// service's projection builder without colliding.
pub struct IdempotencyLedger {
    pool: PgPool,
}

impl IdempotencyLedger {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically record `event_id` as processed by `consumer`, if it hasn't
    /// been already.
    ///
    /// Returns `true` if this call is the one that recorded it (the caller
    /// should proceed with processing), `false` if it was already present
    /// (the caller should skip - this delivery is a duplicate).
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Database`] if the query fails.
    pub async fn try_record(
        &self,
        event_id: &str,
        event_type: &str,
        consumer: &str,
    ) -> Result<bool, IdempotencyError> {
        let result = sqlx::query(
            r"
            INSERT INTO processed_events (event_id, event_type, consumer, processed_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (event_id, consumer) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(consumer)
        .execute(&self.pool)
        .await?;

        let newly_recorded = result.rows_affected() == 1;

        if newly_recorded {
            metrics::counter!("idempotency_events_recorded_total").increment(1);
        } else {
            metrics::counter!("idempotency_duplicate_events_total").increment(1);
            tracing::debug!(event_id, consumer, "duplicate event, skipping");
        }

        Ok(newly_recorded)
    }

    /// Check whether `event_id` has already been processed by `consumer`,
    /// without recording anything.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Database`] if the query fails.
    pub async fn is_processed(&self, event_id: &str, consumer: &str) -> Result<bool, IdempotencyError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM processed_events WHERE event_id = $1 AND consumer = $2",
        )
        .bind(event_id)
        .bind(consumer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Look up a recorded entry, for audit or debugging.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::Database`] if the query fails.
    pub async fn get(
        &self,
        event_id: &str,
        consumer: &str,
    ) -> Result<Option<ProcessedEvent>, IdempotencyError> {
        let row = sqlx::query(
            r"
            SELECT event_id, event_type, consumer, processed_at
            FROM processed_events
            WHERE event_id = $1 AND consumer = $2
            ",
        )
        .bind(event_id)
        .bind(consumer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Self::row_to_processed_event(&row)))
    }

    fn row_to_processed_event(row: &sqlx::postgres::PgRow) -> ProcessedEvent {
        use sqlx::Row;
        ProcessedEvent {
            event_id: row.get("event_id"),
            event_type: row.get("event_type"),
            consumer: row.get("consumer"),
            processed_at: row.get("processed_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_event_carries_through_constructed_fields() {
        let event = ProcessedEvent {
            event_id: "evt-1".to_string(),
            event_type: "trip.created.v1".to_string(),
            consumer: "search.projection".to_string(),
            processed_at: Utc::now(),
        };
        assert_eq!(event.event_id, "evt-1");
        assert_eq!(event.consumer, "search.projection");
    }
}
