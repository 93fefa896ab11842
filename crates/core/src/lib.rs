//! # Carpool Core
//!
//! Shared domain primitives for the carpool platform's microservices: the
//! Users, Trips, Bookings and Search services.
//!
//! This crate deliberately contains no HTTP, database or message-bus code.
//! It defines the vocabulary every service imports:
//!
//! - **Identifiers** ([`ids`]): strongly typed wrappers around the opaque ids
//!   that cross service boundaries (trip id, booking id, event id, ...).
//! - **Events** ([`event`]): the `DomainEvent` trait and the JSON wire
//!   envelope used on the bus.
//! - **Event bus** ([`event_bus`]): the `EventBus` publish/subscribe trait,
//!   implemented by `carpool-redpanda` in production and by an in-memory bus
//!   in tests.
//! - **Optimistic concurrency** ([`optimistic`]): the `Version` type and the
//!   conflict error shared by every store that does versioned compare-and-update.
//! - **Errors** ([`error`]): the stable error-kind taxonomy from which every
//!   service's HTTP and bus error types are built.
//!
//! # Architecture Principles
//!
//! - Functional core, imperative shell: validation and state transitions are
//!   plain functions; I/O lives in the services and the `carpool-postgres`
//!   / `carpool-redpanda` crates.
//! - Explicit errors: no panics or exceptions for expected business outcomes.
//! - Dependency injection via traits (`EventBus`) rather than process-wide
//!   globals.

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod error;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod optimistic;
