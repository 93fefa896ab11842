//! The users service's error type, mapped to the shared [`ErrorKind`]
//! taxonomy at the HTTP boundary.

use carpool_core::error::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors produced by the users service's domain and repository layers.
#[derive(Error, Debug)]
pub enum UsersError {
    /// A registration request failed a domain validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registration was attempted with an email already in use.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// No user exists with the given id or email.
    #[error("user not found: {0}")]
    NotFound(String),

    /// Login was attempted with a wrong email/password combination.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The password could not be hashed or verified.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// A token could not be issued.
    #[error("failed to issue token: {0}")]
    TokenIssuance(String),

    /// A database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DomainError for UsersError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(msg) => ErrorKind::Validation(msg.clone()),
            Self::EmailTaken => ErrorKind::Conflict(self.to_string()),
            Self::NotFound(id) => ErrorKind::NotFound {
                resource: "user",
                id: id.clone(),
            },
            Self::InvalidCredentials => ErrorKind::Unauthenticated(self.to_string()),
            Self::Hashing(msg) | Self::TokenIssuance(msg) => ErrorKind::Internal(msg.clone()),
            Self::Database(e) => ErrorKind::DependencyUnavailable(e.to_string()),
        }
    }
}
