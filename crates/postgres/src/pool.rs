//! Connection pool construction.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Pool sizing and timeout configuration.
///
/// Defaults are deliberately conservative for a service instance sharing a
/// database with three siblings: enough concurrency to saturate one service's
/// connection budget, not so much that four services together exhaust
/// Postgres's `max_connections`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections this pool will open.
    pub max_connections: u32,
    /// How long to wait for a connection before giving up.
    pub acquire_timeout: Duration,
    /// Close and replace a connection that's been idle this long.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Build a connection pool against `database_url`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the initial connection cannot be established.
pub async fn build_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
}
