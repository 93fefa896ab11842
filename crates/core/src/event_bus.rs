//! Event bus abstraction for cross-service communication.
//!
//! This module provides the [`EventBus`] trait for publishing and subscribing
//! to events across the Users, Trips, Bookings and Search services. Events
//! flow from a service's own Postgres-backed state through the bus to the
//! services that need to react to them.
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: a message may be delivered more than once.
//! - **Idempotency**: consumers must tolerate duplicates (see the idempotency
//!   ledger in `carpool-postgres`).
//! - **Ordered within partition**: messages for the same entity (partitioned
//!   by its id) are delivered in order.
//!
//! # Topic Naming Convention
//!
//! Topics follow `{aggregate}.events`: `trips.events`, `bookings.events`.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (in `carpool-core`, behind `#[cfg(test)]` re-export in
//!   each service) - synchronous, for unit tests.
//! - `RedpandaEventBus` (in `carpool-redpanda`) - Kafka-protocol-compatible,
//!   for production.

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the bus.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to one or more topics.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to deserialize a message's envelope.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Topic name is invalid for this transport.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Consumer group registration or rebalance failure.
    #[error("consumer group error: {0}")]
    ConsumerGroupError(String),

    /// Network or transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Generic error for failures with no better-fitting variant.
    #[error("event bus error: {0}")]
    Other(String),
}

/// Stream of messages from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Publish/subscribe abstraction over the message bus.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// trait can be used as `Arc<dyn EventBus>` in service state, shared across
/// HTTP handlers and the background consumer task.
pub trait EventBus: Send + Sync {
    /// Publish an event envelope to a topic.
    ///
    /// Delivered at-least-once; subscribers must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the underlying transport
    /// rejects or fails to send the message.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics, returning a stream of envelopes.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
