//! Application state for Axum handlers.
//!
//! Each service (users, trips, bookings, search) owns its own concrete state
//! struct - a database pool, an event bus handle, maybe a search-engine
//! client wrapped in a circuit breaker - so there is no one shared `AppState`
//! type here. What's shared is the *bound* Axum requires of it: `Clone +
//! Send + Sync + 'static`. [`AppState`] names that bound so generic code in
//! this crate (the readiness handler in [`crate::handlers::health`]) can be
//! written once against any service's state instead of once per service.
//!
//! # Examples
//!
//! ```ignore
//! use carpool_web::AppState;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct TripsState {
//!     db: PgPool,
//!     event_bus: Arc<dyn carpool_core::event_bus::EventBus>,
//! }
//!
//! impl AppState for TripsState {}
//! ```

/// Marker trait for a service's Axum state type.
///
/// Blanket-implemented for every type that already satisfies the bound, so
/// in practice a service only needs `#[derive(Clone)]` on its state struct
/// and this trait is satisfied for free.
pub trait AppState: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> AppState for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct ExampleState {
        name: String,
    }

    fn assert_app_state<T: AppState>() {}

    #[test]
    fn clone_send_sync_types_satisfy_app_state() {
        assert_app_state::<ExampleState>();
        let _ = ExampleState {
            name: "trips".to_string(),
        };
    }
}
