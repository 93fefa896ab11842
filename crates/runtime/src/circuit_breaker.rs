//! Circuit breaker for preventing cascading failures against an unhealthy
//! dependency.
//!
//! The search service wraps its search-engine client in one of these: once
//! the engine has failed enough consecutive calls, the breaker opens and the
//! service falls back to serving from its own projection store immediately,
//! rather than waiting out a timeout on every request while the engine is down.
//!
//! # States
//!
//! - **Closed**: normal operation, failures are counted.
//! - **Open**: failing fast, rejecting calls immediately.
//! - **HalfOpen**: after `timeout` elapses, a limited number of calls are let
//!   through to test recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,
    /// Failing fast, rejecting requests immediately.
    Open,
    /// Testing whether the dependency has recovered.
    HalfOpen,
}

/// The circuit is open and rejected the call before it was attempted.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker is open")]
pub struct CircuitBreakerError;

/// Either a circuit-breaker rejection or the wrapped operation's own error.
#[derive(Debug)]
pub enum Either<L, R> {
    /// The circuit rejected the call.
    Left(L),
    /// The operation itself failed.
    Right(R),
}

impl<L: std::fmt::Display, R: std::fmt::Display> std::fmt::Display for Either<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left(l) => write!(f, "{l}"),
            Self::Right(r) => write!(f, "{r}"),
        }
    }
}

impl<L: std::error::Error, R: std::error::Error> std::error::Error for Either<L, R> {}

/// Wraps a fallible async operation with circuit-breaker protection.
///
/// # State transitions
///
/// - `Closed` → `Open`: after `failure_threshold` consecutive failures.
/// - `Open` → `HalfOpen`: after `timeout` has elapsed since opening.
/// - `HalfOpen` → `Closed`: after `success_threshold` consecutive successes.
/// - `HalfOpen` → `Open`: on any failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Arc<AtomicU8>,
    failure_count: Arc<AtomicUsize>,
    success_count: Arc<AtomicUsize>,
    opened_at: Arc<AtomicU64>,
    failure_threshold: usize,
    timeout: Duration,
    success_threshold: usize,
}

impl CircuitBreaker {
    /// Build a breaker with default thresholds (5 failures to open, 60s
    /// timeout, 2 successes to close).
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            failure_count: Arc::new(AtomicUsize::new(0)),
            success_count: Arc::new(AtomicUsize::new(0)),
            opened_at: Arc::new(AtomicU64::new(0)),
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }

    /// Override the number of consecutive failures before the circuit opens.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Override how long the circuit stays open before probing recovery.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the number of consecutive successes needed to close the circuit.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn check(&self) -> Result<(), CircuitBreakerError> {
        match self.state() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at_nanos = self.opened_at.load(Ordering::Acquire);
                let now_nanos = now_nanos();
                let elapsed = Duration::from_nanos(now_nanos.saturating_sub(opened_at_nanos));

                if elapsed >= self.timeout {
                    self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    metrics::counter!("search_circuit_breaker_state_change_total", "from" => "open", "to" => "half_open")
                        .increment(1);
                    tracing::info!("circuit breaker transitioning from open to half-open");
                    Ok(())
                } else {
                    Err(CircuitBreakerError)
                }
            }
            CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Record that a call through the breaker succeeded.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.success_threshold {
                    self.state.store(CircuitState::Closed as u8, Ordering::Release);
                    self.failure_count.store(0, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    metrics::counter!("search_circuit_breaker_state_change_total", "from" => "half_open", "to" => "closed")
                        .increment(1);
                    tracing::info!("circuit breaker transitioning from half-open to closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record that a call through the breaker failed.
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold {
                    self.open_now();
                    tracing::warn!(failures, threshold = self.failure_threshold, "circuit breaker opening");
                }
            }
            CircuitState::HalfOpen => {
                self.open_now();
                self.success_count.store(0, Ordering::Release);
                tracing::warn!("circuit breaker reopening from half-open");
            }
            CircuitState::Open => {}
        }
    }

    fn open_now(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.opened_at.store(now_nanos(), Ordering::Release);
        metrics::counter!("search_circuit_breaker_state_change_total", "to" => "open").increment(1);
    }

    /// Run `f` through the breaker: rejects immediately if open, otherwise
    /// calls `f` and records the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Either::Left`] if the circuit is open, [`Either::Right`]
    /// with `f`'s own error if it fails.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, Either<CircuitBreakerError, E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.check().map_err(Either::Left)?;

        match f().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(error) => {
                self.record_failure();
                Err(Either::Right(error))
            }
        }
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            failure_count: Arc::clone(&self.failure_count),
            success_count: Arc::clone(&self.success_count),
            opened_at: Arc::clone(&self.opened_at),
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
            success_threshold: self.success_threshold,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new().with_failure_threshold(2);

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_calling() {
        let breaker = CircuitBreaker::new().with_failure_threshold(1);
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;

        let result = breaker.call(|| async { Ok::<_, &str>(1) }).await;
        assert!(matches!(result, Err(Either::Left(_))));
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new()
            .with_failure_threshold(1)
            .with_timeout(Duration::from_millis(0))
            .with_success_threshold(1);

        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.call(|| async { Ok::<_, &str>(1) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
