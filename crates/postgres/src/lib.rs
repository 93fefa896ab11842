//! Postgres-backed storage shared across the carpool platform's services.
//!
//! Each service owns its own schema and repository types (trips' seat
//! inventory table, bookings' booking table, search's projection table), but
//! they share two things from this crate:
//!
//! - [`pool`]: a standard `PgPool` builder so every service configures
//!   timeouts and pool sizing the same way.
//! - [`idempotency`]: the [`idempotency::IdempotencyLedger`], the single
//!   source of truth for "have we already applied this event", shared by
//!   every consumer on the bus.

#![forbid(unsafe_code)]

pub mod idempotency;
pub mod pool;

pub use idempotency::IdempotencyLedger;
pub use pool::{PoolConfig, build_pool};
