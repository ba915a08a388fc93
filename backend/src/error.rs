//! Error handling for the Distribution Management Platform
//!
//! Every failure leaves the API as `{ "message", "code", "field"? }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Delete refused because other records still point at the entity
    #[error("{resource} still has dependents: {}", .dependents.join(", "))]
    HasDependents {
        resource: String,
        dependents: Vec<String>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    /// `HasDependents` naming every non-zero count, or `None` when nothing
    /// blocks the delete
    pub fn blocked_by(resource: &str, counts: &[(i64, &str)]) -> Option<Self> {
        let dependents: Vec<String> = counts
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, label)| format!("{} {}", n, label))
            .collect();

        (!dependents.is_empty()).then(|| AppError::HasDependents {
            resource: resource.to_string(),
            dependents,
        })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.to_string(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_CREDENTIALS", "Invalid username or password"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_TOKEN", "Invalid or expired token"),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("FORBIDDEN", message.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message: message.clone(),
                    code: "VALIDATION_ERROR".to_string(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", message.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message: format!("A record with this {} already exists", field),
                    code: "DUPLICATE_ENTRY".to_string(),
                    field: Some(field.clone()),
                },
            ),
            AppError::HasDependents { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("HAS_DEPENDENTS", format!("Cannot delete: {}", self)),
            ),
            AppError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("CONFLICT", message.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Turn a `shared::validation` failure into a field-level error
pub trait ValidateField {
    fn on_field(self, field: &str) -> AppResult<()>;
}

impl ValidateField for Result<(), &'static str> {
    fn on_field(self, field: &str) -> AppResult<()> {
        self.map_err(|message| AppError::validation(field, message))
    }
}

/// Map a unique-constraint violation to `DuplicateEntry`, passing everything
/// else through
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependents_message_lists_blockers() {
        let err = AppError::HasDependents {
            resource: "Region".to_string(),
            dependents: vec!["2 zone(s)".to_string(), "1 user(s)".to_string()],
        };
        assert_eq!(err.to_string(), "Region still has dependents: 2 zone(s), 1 user(s)");
    }

    #[test]
    fn test_blocked_by_skips_zero_counts() {
        assert!(AppError::blocked_by("Zone", &[(0, "wilaya(s)"), (0, "user(s)")]).is_none());

        let err = AppError::blocked_by("Zone", &[(3, "wilaya(s)"), (0, "user(s)")]).unwrap();
        assert_eq!(err.to_string(), "Zone still has dependents: 3 wilaya(s)");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::validation("note", "too short"), StatusCode::BAD_REQUEST),
            (AppError::forbidden("nope"), StatusCode::FORBIDDEN),
            (AppError::NotFound("Sale".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("exists".into()), StatusCode::CONFLICT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let response = AppError::Internal("pool timed out at 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("INTERNAL_ERROR"));
        assert!(!body.contains("10.0.0.3"));
    }

    #[test]
    fn test_validate_field_adapter() {
        let err = shared::validate_adjustment_note("abc").on_field("note").unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "note"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
