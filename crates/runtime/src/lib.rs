//! # Carpool Runtime
//!
//! Resilience primitives shared across the carpool platform's services:
//!
//! - [`retry`]: bounded exponential-backoff retry for transient failures
//!   (the idempotency ledger insert, a bus publish, a database call).
//! - [`circuit_breaker`]: fail-fast protection for a flaky or down
//!   dependency (the search service's Solr-compatible client wraps its calls
//!   in one of these so it can fall back to the primary store immediately
//!   instead of queuing requests behind a dead connection).
//! - [`metrics`]: a Prometheus exporter plus small per-area recorder structs
//!   (`BookingMetrics`, `InventoryMetrics`, `IdempotencyMetrics`, ...).
//!
//! This crate is deliberately free of domain types - see `carpool-core` for
//! those - so it can be reused unmodified by any service.

pub mod circuit_breaker;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState, Either};
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
