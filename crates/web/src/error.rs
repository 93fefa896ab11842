//! Error types for web handlers.
//!
//! This module bridges domain errors and HTTP responses: every handler
//! returns `Result<Json<T>, AppError>`, and `AppError` knows how to render
//! itself as the `{success, data, error}` envelope every service's HTTP
//! surface shares.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use carpool_core::error::ErrorKind;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Wraps a [`carpool_core::error::ErrorKind`] (or is constructed directly via
/// one of the status-specific helpers) and implements Axum's `IntoResponse`.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let trip = find_trip(id).await.map_err(AppError::from_domain)?;
///     Ok(Json(trip))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    #[allow(dead_code)]
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging (never exposed to the client).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Build an `AppError` from the shared domain [`ErrorKind`] taxonomy.
    ///
    /// This is the mapping every service relies on to avoid duplicating a
    /// status-code table: a validation failure becomes 400, a missing
    /// resource 404, a lost optimistic-concurrency race 409, and so on.
    #[must_use]
    pub fn from_kind(kind: ErrorKind) -> Self {
        let code = kind.code().to_string();
        let message = kind.to_string();
        let status = match &kind {
            ErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
            ErrorKind::NotFound { .. } => StatusCode::NOT_FOUND,
            ErrorKind::Conflict(_) => StatusCode::CONFLICT,
            ErrorKind::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, message, code)
    }

    /// Build an `AppError` from any error implementing [`carpool_core::error::DomainError`].
    #[must_use]
    pub fn from_domain<E: carpool_core::error::DomainError>(err: E) -> Self {
        let kind = err.kind();
        Self::from_kind(kind).with_source(anyhow::Error::new(err))
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "validation_error".to_string())
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "unauthenticated".to_string())
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message.into(), "forbidden".to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} not found: {id}"),
            "not_found".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "conflict".to_string())
    }

    /// Create a 422 Unprocessable Entity error (a narrower validation failure
    /// than [`AppError::bad_request`], for request bodies that parse but fail
    /// semantic checks).
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "validation_error".to_string(),
        )
    }

    /// Create a 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, message.into(), "timeout".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "internal_error".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error (a downstream dependency - the
    /// database, the bus, the search engine - could not be reached).
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "dependency_unavailable".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// The `error` field of the shared envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// The response envelope every endpoint returns: `{success, data, error}`.
///
/// Handlers construct the success side via [`ApiResponse::ok`]; the error
/// side is produced automatically by `AppError`'s `IntoResponse` impl, so
/// handlers never build it directly.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful payload.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "internal server error"
                );
            }
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code,
                message: self.message,
            }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("an internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = AppError::bad_request("invalid input");
        assert_eq!(err.to_string(), "[validation_error] invalid input");
    }

    #[test]
    fn not_found_formats_resource_and_id() {
        let err = AppError::not_found("trip", "trip-1");
        assert_eq!(err.to_string(), "[not_found] trip not found: trip-1");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn from_kind_maps_conflict_to_409() {
        let err = AppError::from_kind(ErrorKind::Conflict("stale version".to_string()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "conflict");
    }

    #[test]
    fn from_kind_maps_dependency_unavailable_to_503() {
        let err = AppError::from_kind(ErrorKind::DependencyUnavailable("search engine down".to_string()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn from_kind_maps_not_found_to_404() {
        let err = AppError::from_kind(ErrorKind::NotFound {
            resource: "booking",
            id: "b-1".to_string(),
        });
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
