//! The stable error-kind taxonomy shared by every service.
//!
//! Each service maps its own domain errors down to one of these kinds, and
//! `carpool-web` maps kinds to HTTP status codes. Keeping the taxonomy here
//! (rather than duplicating a status-code table in every service) is what
//! keeps the mapping consistent across the Users, Trips, Bookings and Search
//! HTTP surfaces.

use std::fmt;
use thiserror::Error;

/// A domain-level error kind, independent of any particular transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was syntactically fine but failed a domain validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No credentials were presented, or the credentials presented don't verify.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credentials verified but the caller isn't allowed to perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of entity, e.g. `"trip"`.
        resource: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The request conflicts with current state (optimistic concurrency loss,
    /// duplicate booking attempt, etc).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A downstream dependency (database, message bus, search engine) is
    /// unavailable or timed out.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Anything else: a bug, or a failure with no better-fitting kind.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// A short, stable machine-readable code for this kind, used in error
    /// response bodies and log fields.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Implemented by every service's top-level error enum so shared
/// infrastructure (HTTP error mapping, bus consumer retry logic) can reason
/// about errors without depending on each service's concrete error type.
pub trait DomainError: std::error::Error + Send + Sync + 'static {
    /// Classify this error into the shared taxonomy.
    fn kind(&self) -> ErrorKind;
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_resource_and_id() {
        let kind = ErrorKind::NotFound {
            resource: "trip",
            id: "trip-1".to_string(),
        };
        assert_eq!(kind.to_string(), "trip not found: trip-1");
        assert_eq!(kind.code(), "not_found");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::Conflict("x".into()).code(), "conflict");
        assert_eq!(
            ErrorKind::DependencyUnavailable("x".into()).code(),
            "dependency_unavailable"
        );
    }
}
