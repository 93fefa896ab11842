//! Integration tests for [`RedpandaEventBus`] against a real Kafka-compatible broker.
//!
//! These tests use testcontainers to spin up a Kafka instance and validate:
//! - Publish/subscribe round-trip on `trips.events`
//! - Consumer groups and load balancing
//! - At-least-once delivery semantics
//! - Multiple topics
//! - Ordering within a partition
//!
//! # Panics
//!
//! These tests use `expect()` and `panic!()` for setup failures, which is acceptable in test code.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use carpool_core::event::SerializedEvent;
use carpool_core::event_bus::EventBus;
use carpool_redpanda::RedpandaEventBus;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers_modules::kafka::{Kafka, KAFKA_PORT};

/// Build a test envelope carrying `seat_count` as its only payload field.
fn test_event(event_type: &str, seat_count: i64) -> SerializedEvent {
    SerializedEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        event_type: event_type.to_string(),
        timestamp: Utc::now(),
        payload: serde_json::json!({ "seat_count": seat_count }),
        metadata: None,
    }
}

/// Wait for Kafka to accept a publish before running the real test body.
async fn wait_for_kafka_ready(brokers: &str) {
    let max_attempts = 30;
    for attempt in 1..=max_attempts {
        if let Ok(bus) = RedpandaEventBus::new(brokers) {
            let event = test_event("trip.created.v1", 4);
            if bus.publish("readiness-probe", &event).await.is_ok() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

#[tokio::test]
async fn publish_and_subscribe_round_trip() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let mut stream = event_bus
        .subscribe(&["trips.events"])
        .await
        .expect("Failed to subscribe");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let event1 = test_event("trip.created.v1", 4);
    let event2 = test_event("trip.seats_reserved.v1", 1);

    event_bus
        .publish("trips.events", &event1)
        .await
        .expect("Failed to publish event1");
    event_bus
        .publish("trips.events", &event2)
        .await
        .expect("Failed to publish event2");

    let mut received = Vec::new();
    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while received.len() < 2 {
            if let Some(result) = stream.next().await {
                let event = result.expect("Failed to receive event");
                received.push(event);
            }
        }
    });

    timeout.await.expect("Timeout waiting for events");

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].event_type, "trip.created.v1");
    assert_eq!(received[0].payload["seat_count"], 4);
    assert_eq!(received[1].event_type, "trip.seats_reserved.v1");
    assert_eq!(received[1].payload["seat_count"], 1);
}

#[tokio::test]
async fn consumer_groups_load_balance_across_subscribers() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .consumer_group("bookings.reservation_consumer")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let mut stream1 = event_bus
        .subscribe(&["bookings.events"])
        .await
        .expect("Failed to subscribe consumer 1");
    let mut stream2 = event_bus
        .subscribe(&["bookings.events"])
        .await
        .expect("Failed to subscribe consumer 2");

    tokio::time::sleep(Duration::from_secs(2)).await;

    for i in 0..10 {
        let event = test_event("booking.created.v1", i);
        event_bus
            .publish("bookings.events", &event)
            .await
            .expect("Failed to publish event");
    }

    let mut received1 = HashSet::new();
    let mut received2 = HashSet::new();

    let timeout = tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            tokio::select! {
                Some(result) = stream1.next() => {
                    if let Ok(event) = result {
                        received1.insert(event.event_id.clone());
                    }
                }
                Some(result) = stream2.next() => {
                    if let Ok(event) = result {
                        received2.insert(event.event_id.clone());
                    }
                }
            }

            if received1.len() + received2.len() >= 10 {
                break;
            }
        }
    });

    timeout.await.expect("Timeout waiting for events");

    assert!(!received1.is_empty(), "Consumer 1 should have received events");
    assert!(!received2.is_empty(), "Consumer 2 should have received events");
    assert!(received1.is_disjoint(&received2), "Consumers should not receive duplicate events");

    let total: HashSet<_> = received1.union(&received2).cloned().collect();
    assert_eq!(total.len(), 10, "Should have received all 10 unique events");
}

#[tokio::test]
async fn multiple_topics_are_independently_consumable() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let mut stream = event_bus
        .subscribe(&["trips.events", "bookings.events"])
        .await
        .expect("Failed to subscribe");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let trip_event = test_event("trip.created.v1", 4);
    let booking_event = test_event("booking.created.v1", 1);

    event_bus
        .publish("trips.events", &trip_event)
        .await
        .expect("Failed to publish trip event");
    event_bus
        .publish("bookings.events", &booking_event)
        .await
        .expect("Failed to publish booking event");

    let mut received = Vec::new();
    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while received.len() < 2 {
            if let Some(result) = stream.next().await {
                let event = result.expect("Failed to receive event");
                received.push(event);
            }
        }
    });

    timeout.await.expect("Timeout waiting for events");

    assert_eq!(received.len(), 2);
    let event_types: HashSet<_> = received.iter().map(|e| e.event_type.as_str()).collect();
    assert!(event_types.contains("trip.created.v1"));
    assert!(event_types.contains("booking.created.v1"));
}

#[tokio::test]
async fn events_published_before_subscribing_are_still_delivered() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .consumer_group("search.projection_at_least_once_test")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let event1 = test_event("trip.created.v1", 2);
    let event2 = test_event("trip.seats_reserved.v1", 1);

    event_bus
        .publish("trips.events", &event1)
        .await
        .expect("Failed to publish event1");
    event_bus
        .publish("trips.events", &event2)
        .await
        .expect("Failed to publish event2");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut stream = event_bus
        .subscribe(&["trips.events"])
        .await
        .expect("Failed to subscribe");

    let mut received = Vec::new();
    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while received.len() < 2 {
            if let Some(result) = stream.next().await {
                let event = result.expect("Failed to receive event");
                received.push(event);
            }
        }
    });

    timeout.await.expect("Timeout waiting for events");

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].event_type, "trip.created.v1");
    assert_eq!(received[1].event_type, "trip.seats_reserved.v1");
}

#[tokio::test]
async fn events_of_the_same_type_stay_ordered_within_a_partition() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let mut stream = event_bus
        .subscribe(&["trips.events"])
        .await
        .expect("Failed to subscribe");

    tokio::time::sleep(Duration::from_millis(500)).await;

    for i in 0..5 {
        let event = test_event("trip.seats_reserved.v1", i);
        event_bus
            .publish("trips.events", &event)
            .await
            .expect("Failed to publish event");
    }

    let mut received = Vec::new();
    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while received.len() < 5 {
            if let Some(result) = stream.next().await {
                let event = result.expect("Failed to receive event");
                received.push(event);
            }
        }
    });

    timeout.await.expect("Timeout waiting for events");

    assert_eq!(received.len(), 5);
    for (i, event) in received.iter().enumerate() {
        assert_eq!(event.payload["seat_count"], i as i64);
    }
}

#[tokio::test]
async fn builder_configuration_is_applied() {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka.get_host_port_ipv4(KAFKA_PORT).await.expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .producer_acks("all")
        .compression("lz4")
        .timeout(Duration::from_secs(10))
        .buffer_size(5000)
        .consumer_group("custom-group")
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let event = test_event("trip.created.v1", 3);
    event_bus
        .publish("config-test", &event)
        .await
        .expect("Failed to publish with custom config");

    assert_eq!(event_bus.brokers(), brokers);
}
