//! The bookings service's error type, mapped to the shared [`ErrorKind`]
//! taxonomy at the HTTP boundary.

use carpool_core::error::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors produced by the bookings service's domain and repository layers.
#[derive(Error, Debug)]
pub enum BookingsError {
    /// A creation or cancellation request failed a domain validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No booking exists with the given id.
    #[error("booking not found: {0}")]
    NotFound(String),

    /// The caller isn't the booking's passenger.
    #[error("only the passenger may perform this action")]
    NotOwner,

    /// The passenger already has a non-terminal booking on this trip.
    #[error("a pending or confirmed booking already exists for this trip")]
    DuplicateBooking,

    /// The booking is in a terminal state and cannot be transitioned further.
    #[error("booking is in a terminal state")]
    TerminalState,

    /// A cancellation was attempted too close to departure.
    #[error("cancellation window has passed")]
    CancellationWindowPassed,

    /// A database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The event bus rejected a publish.
    #[error("event bus error: {0}")]
    EventBus(#[from] carpool_core::event_bus::EventBusError),

    /// The trips service could not be reached or returned an error.
    #[error("trips service unavailable: {0}")]
    TripsServiceUnavailable(String),
}

impl DomainError for BookingsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(msg) => ErrorKind::Validation(msg.clone()),
            Self::NotFound(id) => ErrorKind::NotFound {
                resource: "booking",
                id: id.clone(),
            },
            Self::NotOwner => ErrorKind::Forbidden("not the booking's passenger".to_string()),
            Self::DuplicateBooking => ErrorKind::Conflict(self.to_string()),
            Self::TerminalState | Self::CancellationWindowPassed => ErrorKind::Validation(self.to_string()),
            Self::Database(e) => ErrorKind::DependencyUnavailable(e.to_string()),
            Self::EventBus(e) => ErrorKind::DependencyUnavailable(e.to_string()),
            Self::TripsServiceUnavailable(msg) => ErrorKind::DependencyUnavailable(msg.clone()),
        }
    }
}
