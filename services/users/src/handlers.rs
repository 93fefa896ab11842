//! HTTP surface for the users service: registration, login, and profile
//! lookup.

use crate::domain::{is_valid_rating, validate_new_user, NewUser, UserProfile};
use crate::error::UsersError;
use crate::password::verify_password;
use crate::state::UsersState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use carpool_auth::Role;
use carpool_core::ids::UserId;
use carpool_web::handlers::health::{HealthCheck, HealthReporter, HealthStatus};
use carpool_web::{AppError, AuthUser};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/v1/users/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email, unique across the platform.
    pub email: String,
    /// Plaintext password, hashed before it's ever persisted.
    pub password: String,
    /// Display name.
    pub display_name: String,
    /// Requested capability set.
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Passenger
}

/// Request body for `POST /api/v1/users/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Response body for a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed bearer token.
    pub token: String,
}

/// Request body for `POST /api/v1/users/:id/ratings`.
#[derive(Debug, Deserialize)]
pub struct RateUserRequest {
    /// The trip this rating is attached to; also the idempotency key
    /// alongside the caller's id.
    pub trip_id: String,
    /// A rating in `[1, 5]`.
    pub rating: i16,
}

/// `GET /health/ready` - reports whether this instance's dependencies are
/// actually usable, not just whether the process is running.
pub async fn readiness(State(state): State<UsersState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.check_health().await;
    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// `POST /api/v1/users/register` - create an account.
///
/// # Errors
///
/// Returns [`AppError::validation`] if the request fails domain validation,
/// or a mapped [`UsersError`] if the email is already taken.
pub async fn register(State(state): State<UsersState>, Json(body): Json<RegisterRequest>) -> Result<Json<UserProfile>, AppError> {
    let new_user = NewUser {
        email: body.email,
        password: body.password,
        display_name: body.display_name,
        role: body.role,
    };

    validate_new_user(&new_user).map_err(AppError::validation)?;

    let user = state.repository.register(new_user).await.map_err(AppError::from_domain)?;

    Ok(Json(user.into_owned_profile()))
}

/// `POST /api/v1/users/login` - exchange credentials for a bearer token.
///
/// # Errors
///
/// Returns a mapped [`UsersError::InvalidCredentials`] for any wrong
/// email/password combination - the failure never reveals which was wrong.
pub async fn login(State(state): State<UsersState>, Json(body): Json<LoginRequest>) -> Result<Json<TokenResponse>, AppError> {
    let user = state.repository.find_by_email(&body.email).await.map_err(AppError::from_domain)?;

    verify_password(&body.password, &user.password_hash).map_err(AppError::from_domain)?;

    let token = state
        .token_issuer
        .issue(user.id.as_str(), user.role, Utc::now())
        .map_err(|e| AppError::from_domain(UsersError::TokenIssuance(e.to_string())))?;

    Ok(Json(TokenResponse { token }))
}

/// `GET /api/v1/users/:id` - public profile projection (no email).
///
/// # Errors
///
/// Returns a 404-mapped [`AppError`] if no such user exists.
pub async fn get_profile(State(state): State<UsersState>, Path(id): Path<String>) -> Result<Json<UserProfile>, AppError> {
    let user = state.repository.find(&UserId::new(id)).await.map_err(AppError::from_domain)?;
    Ok(Json(user.into_profile()))
}

/// `GET /api/v1/users/me` - the authenticated caller's own full profile,
/// including email.
///
/// # Errors
///
/// Returns a mapped [`AppError`] if the token's subject no longer exists.
pub async fn get_me(State(state): State<UsersState>, auth: AuthUser) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .repository
        .find(&UserId::new(auth.user_id))
        .await
        .map_err(AppError::from_domain)?;
    Ok(Json(user.into_owned_profile()))
}

/// `POST /api/v1/users/:id/ratings` - submit a rating for a completed trip.
///
/// Idempotent per (caller, trip): a repeat submission is a no-op rather
/// than double-counting toward the ratee's average.
///
/// # Errors
///
/// Returns [`AppError::validation`] if the rating is out of `[1, 5]`.
pub async fn rate_user(
    State(state): State<UsersState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<RateUserRequest>,
) -> Result<StatusCode, AppError> {
    if !is_valid_rating(body.rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }

    let ratee_id = UserId::new(id);
    let rater_id = UserId::new(auth.user_id);

    state
        .repository
        .record_rating(&ratee_id, &rater_id, &body.trip_id, body.rating)
        .await
        .map_err(AppError::from_domain)?;

    Ok(StatusCode::NO_CONTENT)
}
