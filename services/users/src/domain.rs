//! The user aggregate and its rating accumulator.

use carpool_auth::Role;
use carpool_core::ids::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Minimum password length enforced at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A user record, as held by this service.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable id.
    pub id: UserId,
    /// Unique email.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Opaque password hash, never serialized onto the wire.
    pub password_hash: String,
    /// Capability set.
    pub role: Role,
    /// Sum of ratings received.
    pub rating_sum: i64,
    /// Count of ratings received.
    pub rating_count: i64,
    /// Completed trips as a driver.
    pub total_trips_as_driver: i64,
    /// Completed trips as a passenger.
    pub total_trips_as_passenger: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `rating_sum / rating_count`, or `None` if nobody has rated this user yet.
    #[must_use]
    pub fn average_rating(&self) -> Option<f64> {
        if self.rating_count == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            Some(self.rating_sum as f64 / self.rating_count as f64)
        }
    }

    /// The public profile view: no password hash, ever.
    #[must_use]
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            average_rating: self.average_rating(),
            id: self.id,
            email: None,
            display_name: self.display_name,
            role: self.role,
            rating_count: self.rating_count,
            total_trips_as_driver: self.total_trips_as_driver,
            total_trips_as_passenger: self.total_trips_as_passenger,
        }
    }

    /// The profile view with email included, for the authenticated owner.
    #[must_use]
    pub fn into_owned_profile(self) -> UserProfile {
        let mut profile = self.clone().into_profile();
        profile.email = Some(self.email);
        profile
    }
}

/// Public-facing projection of a [`User`]. `email` is populated only when
/// the caller is the profile's owner.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    /// Stable id.
    pub id: UserId,
    /// Present only for the profile's owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Capability set.
    pub role: Role,
    /// Derived average, `None` until the first rating lands.
    pub average_rating: Option<f64>,
    /// Count of ratings received.
    pub rating_count: i64,
    /// Completed trips as a driver.
    pub total_trips_as_driver: i64,
    /// Completed trips as a passenger.
    pub total_trips_as_passenger: i64,
}

/// Input to [`crate::repository::UserRepository::register`].
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email, checked for uniqueness at the store.
    pub email: String,
    /// Plaintext password; hashed before it ever reaches the repository.
    pub password: String,
    /// Display name.
    pub display_name: String,
    /// Capability set requested at signup.
    pub role: Role,
}

/// Validate a registration request's shape before hashing the password or
/// touching the store.
///
/// # Errors
///
/// Returns a human-readable validation message.
pub fn validate_new_user(new_user: &NewUser) -> Result<(), String> {
    if !new_user.email.contains('@') || new_user.email.len() < 3 {
        return Err("email is not a valid address".to_string());
    }
    if new_user.display_name.trim().is_empty() {
        return Err("display_name must not be empty".to_string());
    }
    if new_user.password.len() < MIN_PASSWORD_LEN {
        return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
    }
    Ok(())
}

/// A rating in `[1, 5]`.
#[must_use]
pub const fn is_valid_rating(rating: i16) -> bool {
    rating >= 1 && rating <= 5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> NewUser {
        NewUser {
            email: "rider@example.com".to_string(),
            password: "correct-horse-battery".to_string(),
            display_name: "Rider".to_string(),
            role: Role::Passenger,
        }
    }

    #[test]
    fn rejects_short_password() {
        let mut new_user = sample_user();
        new_user.password = "short".to_string();
        let err = validate_new_user(&new_user).unwrap_err();
        assert!(err.contains("password"));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut new_user = sample_user();
        new_user.email = "not-an-email".to_string();
        let err = validate_new_user(&new_user).unwrap_err();
        assert!(err.contains("email"));
    }

    #[test]
    fn rejects_blank_display_name() {
        let mut new_user = sample_user();
        new_user.display_name = "   ".to_string();
        let err = validate_new_user(&new_user).unwrap_err();
        assert!(err.contains("display_name"));
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate_new_user(&sample_user()).is_ok());
    }

    #[test]
    fn average_rating_is_none_before_the_first_rating() {
        let user = User {
            id: UserId::generate(),
            email: "a@b.com".into(),
            display_name: "A".into(),
            password_hash: "hash".into(),
            role: Role::Driver,
            rating_sum: 0,
            rating_count: 0,
            total_trips_as_driver: 0,
            total_trips_as_passenger: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.average_rating(), None);
    }

    #[test]
    fn rating_bounds() {
        assert!(is_valid_rating(1));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(0));
        assert!(!is_valid_rating(6));
    }
}
