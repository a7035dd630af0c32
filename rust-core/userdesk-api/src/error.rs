//! # Errors
//!
//! One enum per layer. Repository failures are storage-shaped; service and
//! handler failures are [`ApiError`], which knows its HTTP status and body.

use thiserror::Error;
use tracing::error;
use userdesk_core::{FieldError, HttpResponse, ValidationCode, ValidationErrors};

/// Result alias for service and handler code
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors raised by a repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A UNIQUE constraint rejected the write
    #[error("duplicate value: {0}")]
    Duplicate(String),

    /// The query itself failed
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The session could not provide a connection or finish its transaction
    #[error("session error: {0}")]
    Session(#[source] userdesk_core::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            _ => Self::Query(err),
        }
    }
}

impl From<userdesk_core::Error> for RepositoryError {
    fn from(err: userdesk_core::Error) -> Self {
        match err {
            userdesk_core::Error::Database(e) => e.into(),
            other => Self::Session(other),
        }
    }
}

/// Errors surfaced to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed schema validation (422)
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Lookup returned nothing (404)
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or state conflict (400)
    #[error("{0}")]
    Conflict(String),

    /// Missing or rejected credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage failure (500)
    #[error("repository error: {0}")]
    Repository(#[source] RepositoryError),

    /// Anything else that is our fault (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Config(_) | Self::Repository(_) | Self::Internal(_) => 500,
        }
    }

    /// Render as a JSON response
    ///
    /// Server-side failures are logged and answered with a generic message.
    pub fn into_response(self) -> HttpResponse {
        match self {
            Self::Validation(errors) => HttpResponse::json(errors.to_json()).with_status(422),
            Self::Unauthorized(message) => {
                HttpResponse::error(401, &message).with_header("WWW-Authenticate", "Bearer")
            }
            Self::NotFound(message) => HttpResponse::error(404, &message),
            Self::Conflict(message) => HttpResponse::error(400, &message),
            err @ (Self::Config(_) | Self::Repository(_) | Self::Internal(_)) => {
                error!(error = %err, "request failed");
                HttpResponse::error(500, "Internal Server Error")
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(detail) => {
                if detail.contains("username") {
                    Self::Conflict("Username already taken".to_string())
                } else {
                    Self::Conflict("Email already registered".to_string())
                }
            }
            other => Self::Repository(other),
        }
    }
}

impl From<userdesk_core::Error> for ApiError {
    fn from(err: userdesk_core::Error) -> Self {
        match err {
            userdesk_core::Error::InvalidJson { reason } => {
                let error = FieldError::new("body", reason, ValidationCode::InvalidType);
                Self::Validation(ValidationErrors::single(error))
            }
            userdesk_core::Error::Database(e) => Self::Repository(e.into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NotFound("User not found".into()).status(), 404);
        assert_eq!(ApiError::Conflict("Email already registered".into()).status(), 400);
        assert_eq!(ApiError::Unauthorized("nope".into()).status(), 401);
        assert_eq!(ApiError::Validation(ValidationErrors::new()).status(), 422);
        assert_eq!(ApiError::Internal("boom".into()).status(), 500);
    }

    #[test]
    fn test_not_found_body() {
        let resp = ApiError::NotFound("User not found".into()).into_response();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body().unwrap()["error"], "User not found");
    }

    #[test]
    fn test_validation_body() {
        let errors = ValidationErrors::single(FieldError::required("email"));
        let resp = ApiError::from(errors).into_response();
        assert_eq!(resp.status, 422);
        assert_eq!(resp.json_body().unwrap()["errors"][0]["field"], "email");
    }

    #[test]
    fn test_internal_details_hidden() {
        let resp = ApiError::Internal("secret detail".into()).into_response();
        assert_eq!(resp.status, 500);
        assert!(!resp.body.contains("secret detail"));
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: ApiError =
            RepositoryError::Duplicate("UNIQUE constraint failed: users.username".into()).into();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Username already taken"));

        let err: ApiError =
            RepositoryError::Duplicate("UNIQUE constraint failed: users.email".into()).into();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Email already registered"));
    }

    #[test]
    fn test_invalid_json_is_validation() {
        let err: ApiError = userdesk_core::Error::InvalidJson {
            reason: "expected value".into(),
        }
        .into();
        assert_eq!(err.status(), 422);
    }
}
