//! Bearer token issuance and verification for the carpool platform.
//!
//! Every HTTP endpoint across the Users, Trips, Bookings and Search services
//! requires a bearer token carrying a `user_id` and a `role`. The Users
//! service is the only service that *issues* tokens (at registration and
//! login); every service, including Users itself, *verifies* them locally,
//! so request handling never takes a synchronous dependency on the Users
//! service being reachable.
//!
//! Verification is pure computation - a signature check plus an expiry
//! check - so [`TokenVerifier`] has no I/O and no async methods. The signing
//! key is shared configuration (an HMAC secret, layered in via each
//! service's `config` module) rather than a network call.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A user's capabilities within the platform. A user may be a passenger, a
/// driver, or both - modeled as a set rather than an exclusive choice,
/// since nothing stops a driver from also booking rides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May book seats on trips.
    Passenger,
    /// May publish trips and carry passengers.
    Driver,
    /// Both a passenger and a driver.
    Both,
}

impl Role {
    /// Whether this role includes passenger capabilities.
    #[must_use]
    pub const fn can_book(self) -> bool {
        matches!(self, Self::Passenger | Self::Both)
    }

    /// Whether this role includes driver capabilities.
    #[must_use]
    pub const fn can_drive(self) -> bool {
        matches!(self, Self::Driver | Self::Both)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passenger => "passenger",
            Self::Driver => "driver",
            Self::Both => "both",
        };
        write!(f, "{s}")
    }
}

/// The claims carried by every bearer token this platform issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, carried as `sub` per JWT convention.
    pub sub: String,
    /// The user's role.
    pub role: Role,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// The authenticated user's id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Failures from issuing or verifying a token.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token's signature doesn't verify, or its structure is malformed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token verified but has expired.
    #[error("token expired")]
    Expired,

    /// The signing key could not be used to encode a token.
    #[error("failed to issue token: {0}")]
    Encoding(String),

    /// No `Authorization: Bearer <token>` header was presented.
    #[error("missing bearer token")]
    MissingToken,
}

/// Issues bearer tokens, signed with an HMAC secret shared across services.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Build an issuer from a shared secret and a token lifetime.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a signed token for `user_id` carrying `role`, valid from `now`
    /// for this issuer's configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Encoding`] if the JWT library fails to encode
    /// the header/claims (practically unreachable for well-formed input).
    pub fn issue(&self, user_id: &str, role: Role, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }
}

/// Verifies bearer tokens against the shared signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier from the same shared secret used by [`TokenIssuer`].
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a raw token string (without the `Bearer ` prefix) and return
    /// its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Expired`] if the token's `exp` has passed, or
    /// [`AuthError::InvalidToken`] if the signature doesn't verify or the
    /// token is malformed.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Parse and verify an `Authorization` header value of the form
    /// `Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] if the header isn't a well-formed
    /// bearer header, or the errors [`Self::verify`] returns.
    pub fn verify_header(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let token = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (TokenIssuer, TokenVerifier) {
        let secret = b"test-secret-do-not-use-in-production";
        (
            TokenIssuer::new(secret, Duration::hours(1)),
            TokenVerifier::new(secret),
        )
    }

    #[test]
    fn issued_token_verifies_and_round_trips_claims() {
        let (issuer, verifier) = pair();
        let now = Utc::now();
        let token = issuer.issue("user-42", Role::Passenger, now).expect("issue");
        let claims = verifier.verify(&token).expect("verify");
        assert_eq!(claims.user_id(), "user-42");
        assert_eq!(claims.role, Role::Passenger);
    }

    #[test]
    fn expired_token_is_rejected() {
        let (issuer, verifier) = pair();
        let past = Utc::now() - Duration::hours(2);
        let token = issuer.issue("user-1", Role::Driver, past).expect("issue");
        let err = verifier.verify(&token).expect_err("should be expired");
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let (issuer, _) = pair();
        let other_verifier = TokenVerifier::new(b"a-completely-different-secret");
        let token = issuer.issue("user-1", Role::Both, Utc::now()).expect("issue");
        let err = other_verifier.verify(&token).expect_err("should not verify");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn verify_header_requires_bearer_prefix() {
        let (_, verifier) = pair();
        assert!(matches!(
            verifier.verify_header(Some("Basic abc123")),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(verifier.verify_header(None), Err(AuthError::MissingToken)));
    }

    #[test]
    fn role_capability_checks() {
        assert!(Role::Passenger.can_book());
        assert!(!Role::Passenger.can_drive());
        assert!(Role::Driver.can_drive());
        assert!(!Role::Driver.can_book());
        assert!(Role::Both.can_book() && Role::Both.can_drive());
    }
}
