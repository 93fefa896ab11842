//! The search service's error type, mapped to the shared [`ErrorKind`]
//! taxonomy at the HTTP boundary.

use carpool_core::error::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors produced by the search service's query and projection layers.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A query failed validation (e.g. an autocomplete query under the
    /// minimum length).
    #[error("validation failed: {0}")]
    Validation(String),

    /// No projected document exists for the requested trip.
    #[error("trip not found: {0}")]
    NotFound(String),

    /// A database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The search engine rejected a request for a reason other than being
    /// unreachable (the unreachable case is handled by the circuit breaker
    /// and falls back silently, never surfaced as this variant).
    #[error("search engine error: {0}")]
    Engine(String),
}

impl DomainError for SearchError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(msg) => ErrorKind::Validation(msg.clone()),
            Self::NotFound(id) => ErrorKind::NotFound {
                resource: "search_trip",
                id: id.clone(),
            },
            Self::Database(e) => ErrorKind::DependencyUnavailable(e.to_string()),
            Self::Engine(msg) => ErrorKind::DependencyUnavailable(msg.clone()),
        }
    }
}
