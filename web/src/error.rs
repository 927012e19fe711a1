//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses. Every failure body
//! has the same shape:
//!
//! ```json
//! {
//!   "code": "VALIDATION_ERROR",
//!   "message": "Validation error",
//!   "status": 400,
//!   "errors": [
//!     { "failed_field": "quantity", "tag": "gte", "message": "This field must be greater than or equal to 1" }
//!   ]
//! }
//! ```
//!
//! `errors` is omitted when there is no field-level detail.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use ticketing_core::TicketError;

/// A single failed validation rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON name of the offending field.
    pub failed_field: String,
    /// Rule that failed (`required`, `gte`, `uuid4`, ...).
    pub tag: String,
    /// Human-readable explanation.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    #[must_use]
    pub fn new(
        failed_field: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            failed_field: failed_field.into(),
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(id): Path<i64>) -> Result<Json<TicketDto>, AppError> {
///     let ticket = service.find_by_id(TicketId::new(id)).await?;
///     Ok(Json(ticket))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Field-level validation detail
    errors: Vec<FieldError>,
    /// Internal error (for logging, not exposed to client)
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
            errors: Vec::new(),
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 400 error listing the fields that failed validation.
    #[must_use]
    pub fn invalid_fields(errors: Vec<FieldError>) -> Self {
        let mut err = Self::new(
            StatusCode::BAD_REQUEST,
            "Validation error".to_string(),
            "VALIDATION_ERROR".to_string(),
        );
        err.errors = errors;
        err
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "UNPROCESSABLE_ENTITY".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Map a service error, sending storage failures to `fallback`.
    ///
    /// Validation, not-found and insufficient-allocation errors always map
    /// to 400, 404 and 422. Storage failures map to `fallback`.
    #[must_use]
    pub fn from_service(err: TicketError, fallback: StatusCode) -> Self {
        match err {
            TicketError::ValidationFailed { field, message } => {
                Self::invalid_fields(vec![FieldError::new(field, "domain", message)])
            }
            TicketError::TicketNotFound(_) => Self::not_found(err.to_string()),
            TicketError::InsufficientAllocation { .. } => {
                let mut mapped = Self::unprocessable(err.to_string());
                mapped.code = "INSUFFICIENT_ALLOCATION".to_string();
                mapped
            }
            TicketError::PersistenceFailure(_) | TicketError::NoActiveTransaction => {
                let message = if fallback.is_server_error() {
                    "An internal error occurred".to_string()
                } else {
                    err.to_string()
                };
                let code = fallback
                    .canonical_reason()
                    .unwrap_or("ERROR")
                    .to_uppercase()
                    .replace(' ', "_");
                Self::new(fallback, message, code).with_source(anyhow::Error::new(err))
            }
        }
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Field-level validation detail.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (for client error handling).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Numeric HTTP status.
    pub status: u16,
    /// Field-level validation detail.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
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
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        } else if let Some(source) = &self.source {
            tracing::warn!(status = %self.status, error = %source, "Request failed");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            status: self.status.as_u16(),
            errors: self.errors,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        Self::from_service(err, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Malformed or mistyped JSON bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Path parameters that do not parse.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
