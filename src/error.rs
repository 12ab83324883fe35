//! Application error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for the request layer. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::header::{HeaderValue, RETRY_AFTER};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::AuthError;
use crate::store::{PoolError, StoreError};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4002,
///     "message": "too many create_solution requests; retry after 12000 ms",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AppError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                    |
/// |-----------|-----------------------|--------------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request                |
/// | 2000–2999 | Authentication/Access | 401 Unauthorized / 403 Forbidden |
/// | 3000–3999 | Server                | 500 Internal / 503 Unavailable |
/// | 4000–4999 | Resource              | 404 Not Found / 429 Too Many Requests |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Session check or login failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The caller may not touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Solution with the given ID was not found.
    #[error("solution not found: {0}")]
    SolutionNotFound(i32),

    /// Caller exceeded the abuse limit for an action.
    #[error("too many {action} requests; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Limited action name.
        action: String,
        /// Milliseconds until the caller may retry.
        retry_after_ms: u64,
    },

    /// No store connection could be obtained.
    #[error("store unavailable: {0}")]
    Pool(#[from] PoolError),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Auth(AuthError::Unauthenticated) => 2001,
            Self::Auth(AuthError::SessionRevoked) => 2002,
            Self::Auth(AuthError::AccountMissing) => 2003,
            Self::Auth(AuthError::InvalidCredentials) => 2004,
            Self::Forbidden(_) => 2101,
            Self::Internal(_) => 3000,
            Self::Store(_) | Self::Auth(AuthError::Store(_)) => 3001,
            Self::Pool(_) => 3002,
            Self::SolutionNotFound(_) => 4001,
            Self::RateLimited { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::Store(_)) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SolutionNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns `true` if the client presented a session that must now be
    /// discarded entirely.
    #[must_use]
    pub const fn clears_session(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::SessionRevoked | AuthError::AccountMissing)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let retry_after_secs = match &self {
            Self::RateLimited { retry_after_ms, .. } => Some(retry_after_ms.div_ceil(1000)),
            _ => None,
        };
        let clears_session = self.clears_session();

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: clears_session.then(|| "discard the stored session and log in again".to_string()),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Some(secs) = retry_after_secs {
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        if clears_session {
            headers.insert(
                HeaderName::from_static("clear-site-data"),
                HeaderValue::from_static("\"cookies\", \"storage\""),
            );
        }
        response
    }
}
