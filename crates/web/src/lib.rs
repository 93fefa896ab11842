//! Axum HTTP integration shared by the Users, Trips, Bookings and Search services.
//!
//! Each service builds its own `Router` and its own concrete state struct;
//! this crate supplies the pieces that would otherwise be copy-pasted across
//! all four: the `{success, data, error}` response envelope, the shared
//! [`carpool_core::error::ErrorKind`]-to-HTTP-status mapping, correlation-id
//! middleware, common extractors, and liveness/readiness handlers.
//!
//! # Example
//!
//! ```ignore
//! use carpool_web::{AppError, ApiResponse};
//! use axum::{Router, routing::get, extract::State, Json};
//!
//! async fn get_trip(
//!     State(state): State<TripsState>,
//!     Path(trip_id): Path<String>,
//! ) -> Result<ApiResponse<TripView>, AppError> {
//!     let trip = state.repo.find(&trip_id).await.map_err(AppError::from_domain)?;
//!     Ok(ApiResponse::ok(trip))
//! }
//!
//! let app = Router::new()
//!     .route("/api/v1/trips/:id", get(get_trip))
//!     .layer(carpool_web::correlation_id_layer())
//!     .with_state(state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

// Re-export key types for convenience
pub use error::{ApiResponse, AppError};
pub use extractors::{AuthUser, ClientIp, CorrelationId, HasTokenVerifier, UserAgent};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
