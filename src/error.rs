use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::repository::RepoError;
use crate::storage::StorageError;

/// AppError
///
/// The service-level error taxonomy. Lower layers surface raw failures
/// (`RepoError`, `StorageError`); services translate them into one of these variants
/// so no storage-specific text crosses the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Referential-integrity violations and other states that indicate corruption.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),

    #[error("Media storage error: {0}")]
    Media(#[from] StorageError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        AppError::Forbidden(why.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        AppError::Conflict(what.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Storage(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Storage(_) | AppError::Media(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message, field) = match &self {
            AppError::NotFound(_) => ("NOT_FOUND", self.to_string(), None),
            AppError::Forbidden(_) => ("FORBIDDEN", self.to_string(), None),
            AppError::Unauthorized => ("UNAUTHORIZED", self.to_string(), None),
            AppError::Conflict(_) => ("CONFLICT", self.to_string(), None),
            AppError::Validation { field, message } => {
                ("VALIDATION_FAILED", message.clone(), Some(field.clone()))
            }
            AppError::Storage(e) if e.is_retryable() => {
                tracing::warn!("Transient storage failure: {:?}", e);
                (
                    "UNAVAILABLE",
                    "Service temporarily unavailable, retry later".to_string(),
                    None,
                )
            }
            AppError::Internal(_) | AppError::Storage(_) | AppError::Media(_) => {
                tracing::error!("Internal error: {:?}", self);
                ("INTERNAL_ERROR", "Internal server error".to_string(), None)
            }
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(field) = field {
            error["field"] = json!(field);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
