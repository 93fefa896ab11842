//! The trips service's error type, mapped to the shared [`ErrorKind`]
//! taxonomy at the HTTP boundary.

use carpool_core::error::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors produced by the trips service's domain and repository layers.
#[derive(Error, Debug)]
pub enum TripsError {
    /// A creation or update request failed a domain validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No trip exists with the given id.
    #[error("trip not found: {0}")]
    NotFound(String),

    /// The caller isn't the trip's owner.
    #[error("only the trip owner may perform this action")]
    NotOwner,

    /// The optimistic-concurrency predicate found no matching row: either
    /// the trip doesn't exist, its version moved on, or there weren't
    /// enough seats. These deliberately collapse into one kind so callers
    /// can't build logic around distinguishing a race from a capacity miss.
    #[error("inventory conflict: trip state changed or insufficient seats")]
    InventoryConflict,

    /// A database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The event bus rejected a publish.
    #[error("event bus error: {0}")]
    EventBus(#[from] carpool_core::event_bus::EventBusError),
}

impl DomainError for TripsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(msg) => ErrorKind::Validation(msg.clone()),
            Self::NotFound(id) => ErrorKind::NotFound {
                resource: "trip",
                id: id.clone(),
            },
            Self::NotOwner => ErrorKind::Forbidden("not the trip owner".to_string()),
            Self::InventoryConflict => ErrorKind::Conflict(self.to_string()),
            Self::Database(e) => ErrorKind::DependencyUnavailable(e.to_string()),
            Self::EventBus(e) => ErrorKind::DependencyUnavailable(e.to_string()),
        }
    }
}
