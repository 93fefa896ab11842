//! Prometheus metrics server and recorders shared across services.
//!
//! Each service calls [`MetricsServer::start`] once at boot, then uses the
//! small per-area recorder structs below (or the raw `metrics::{counter,
//! gauge, histogram}` macros re-exported here) to instrument its own
//! handlers and background workers.
//!
//! # Example
//!
//! ```rust,no_run
//! use carpool_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the Prometheus exporter.
    #[error("failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the exporter as the global recorder.
    #[error("failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind the metrics HTTP server.
    #[error("failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server. Exposes metrics on an HTTP endpoint for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Build a server bound to `addr` (not yet listening - call [`Self::start`]).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the exporter can't be configured, or
    /// [`MetricsError::Install`] if a recorder is already installed for a
    /// reason other than a test harness re-initializing it.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "metrics server started");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// The installed Prometheus handle, if [`Self::start`] has run.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("bookings_created_total", "Total bookings moved to pending");
    describe_counter!("bookings_confirmed_total", "Total bookings confirmed");
    describe_counter!("bookings_failed_total", "Total bookings that failed (inventory conflict or validation)");
    describe_counter!("bookings_cancelled_total", "Total bookings cancelled");
    describe_histogram!("booking_confirmation_duration_seconds", "Time from pending to confirmed/failed");

    describe_counter!("inventory_reservation_attempts_total", "Total seat reservation compare-and-update attempts");
    describe_counter!("inventory_reservation_conflicts_total", "Total seat reservations that lost the optimistic concurrency race");

    describe_counter!("idempotency_duplicate_events_total", "Total bus events recognized as already processed");
    describe_counter!("idempotency_events_recorded_total", "Total bus events newly recorded in the idempotency ledger");

    describe_counter!("search_projection_events_applied_total", "Total trip events applied to the search projection");
    describe_counter!("search_projection_stale_events_skipped_total", "Total trip events skipped for carrying an older availability_version");
    describe_gauge!("search_projection_lag_seconds", "Age of the last event applied to the search projection");

    describe_counter!("search_engine_queries_total", "Total queries sent to the search engine");
    describe_counter!("search_engine_fallback_total", "Total queries served from the primary store because the search engine was unavailable");

    describe_gauge!("circuit_breaker_state", "Current circuit breaker state (0=closed, 1=open, 2=half_open)");
    describe_counter!("retry_attempts_total", "Total retry attempts across all retrying operations");
    describe_counter!("retry_exhausted_total", "Total operations that exhausted their retry budget");
}

/// Booking lifecycle metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// A booking was created in the pending state.
    pub fn record_created() {
        counter!("bookings_created_total").increment(1);
    }

    /// A booking reached the confirmed state.
    pub fn record_confirmed(duration: Duration) {
        counter!("bookings_confirmed_total").increment(1);
        histogram!("booking_confirmation_duration_seconds").record(duration.as_secs_f64());
    }

    /// A booking reached the failed state.
    pub fn record_failed(duration: Duration) {
        counter!("bookings_failed_total").increment(1);
        histogram!("booking_confirmation_duration_seconds").record(duration.as_secs_f64());
    }

    /// A confirmed booking was cancelled.
    pub fn record_cancelled() {
        counter!("bookings_cancelled_total").increment(1);
    }
}

/// Seat inventory compare-and-update metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record an attempted reservation compare-and-update.
    pub fn record_attempt() {
        counter!("inventory_reservation_attempts_total").increment(1);
    }

    /// Record a reservation that lost the optimistic concurrency race.
    pub fn record_conflict() {
        counter!("inventory_reservation_conflicts_total").increment(1);
    }
}

/// Idempotency ledger metrics recorder.
pub struct IdempotencyMetrics;

impl IdempotencyMetrics {
    /// An event id was already present in the ledger.
    pub fn record_duplicate() {
        counter!("idempotency_duplicate_events_total").increment(1);
    }

    /// An event id was newly inserted into the ledger.
    pub fn record_recorded() {
        counter!("idempotency_events_recorded_total").increment(1);
    }
}

/// Search projection metrics recorder.
pub struct SearchProjectionMetrics;

impl SearchProjectionMetrics {
    /// A trip event was applied to the projection.
    pub fn record_applied(lag: Duration) {
        counter!("search_projection_events_applied_total").increment(1);
        gauge!("search_projection_lag_seconds").set(lag.as_secs_f64());
    }

    /// A trip event was skipped for carrying a stale `availability_version`.
    pub fn record_stale_skipped() {
        counter!("search_projection_stale_events_skipped_total").increment(1);
    }
}

/// Search engine client metrics recorder.
pub struct SearchEngineMetrics;

impl SearchEngineMetrics {
    /// A query was sent to the search engine.
    pub fn record_query() {
        counter!("search_engine_queries_total").increment(1);
    }

    /// A query fell back to the primary store because the search engine was
    /// unavailable.
    pub fn record_fallback() {
        counter!("search_engine_fallback_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_starts_and_allows_rendering() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.start().is_ok());

        BookingMetrics::record_created();
        InventoryMetrics::record_attempt();

        if let Some(rendered) = server.render() {
            assert!(rendered.contains("bookings_created_total") || !rendered.is_empty());
        }
    }
}
