/// Unified error types for the barangay portal
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shared by "no such account" and "wrong password"
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Main error type for the portal
#[derive(Error, Debug)]
pub enum PortalError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials { attempts_left: Option<u32> },

    /// Too many consecutive failures; `time_left` is in seconds
    #[error("Account locked for {time_left}s")]
    AccountLocked { time_left: i64 },

    /// Account has been deactivated by an administrator
    #[error("Account is inactive")]
    AccountInactive,

    /// Authentication errors (missing or bad session token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),
}

/// JSON error body
///
/// Only `error` is always present; the lockout fields appear for the
/// outcomes that carry them.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            attempts_left: None,
            time_left: None,
            is_locked: None,
        }
    }
}

impl PortalError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::InvalidCredentials { .. } | PortalError::Authentication(_) => {
                StatusCode::UNAUTHORIZED
            }
            PortalError::AccountLocked { .. } => StatusCode::LOCKED,
            PortalError::AccountInactive | PortalError::Authorization(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            PortalError::Database(_)
            | PortalError::Internal(_)
            | PortalError::Io(_)
            | PortalError::Jwt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            PortalError::InvalidCredentials { attempts_left } => ErrorResponse {
                attempts_left: *attempts_left,
                ..ErrorResponse::message(INVALID_CREDENTIALS_MESSAGE)
            },
            PortalError::AccountLocked { time_left } => ErrorResponse {
                time_left: Some(*time_left),
                is_locked: Some(true),
                ..ErrorResponse::message(
                    "Account is temporarily locked due to too many failed login attempts",
                )
            },
            PortalError::AccountInactive => ErrorResponse::message(
                "Account is inactive. Please contact the barangay administrator",
            ),
            PortalError::Validation(msg) => ErrorResponse::message(msg.clone()),
            PortalError::Authentication(_) => ErrorResponse::message("Authentication required"),
            PortalError::Authorization(msg) | PortalError::NotFound(msg) | PortalError::Conflict(msg) => {
                ErrorResponse::message(msg.clone())
            }
            PortalError::RateLimitExceeded { .. } => ErrorResponse::message("Rate limit exceeded"),
            // Don't leak details
            PortalError::Database(_)
            | PortalError::Internal(_)
            | PortalError::Io(_)
            | PortalError::Jwt(_) => ErrorResponse::message("Internal server error"),
        }
    }
}

/// Convert PortalError to HTTP response
impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        let mut response = (status, Json(self.body())).into_response();

        if let PortalError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias for portal operations
pub type PortalResult<T> = Result<T, PortalError>;
