//! Error types for mirage-kiosk
//!
//! Every handler failure is answered with `{ "error": <summary>, "details": <raw> }`
//! and one of three status codes: 400, 404 or 500.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::flow::FlowError;
use crate::services::GenerationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required input missing or invalid (400)
    #[error("{summary}: {details}")]
    BadRequest { summary: String, details: String },

    /// Identifier has no record (404)
    #[error("{summary}: {details}")]
    NotFound { summary: String, details: String },

    /// Generation backend failed or returned an unusable response (500)
    #[error("Failed to generate images: {0}")]
    Upstream(#[from] GenerationError),

    /// Store read or write failed (500)
    #[error("{summary}: {details}")]
    Store { summary: String, details: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(summary: impl Into<String>, details: impl ToString) -> Self {
        ApiError::BadRequest {
            summary: summary.into(),
            details: details.to_string(),
        }
    }

    pub fn not_found(summary: impl Into<String>, details: impl ToString) -> Self {
        ApiError::NotFound {
            summary: summary.into(),
            details: details.to_string(),
        }
    }

    pub fn store(summary: impl Into<String>, details: impl ToString) -> Self {
        ApiError::Store {
            summary: summary.into(),
            details: details.to_string(),
        }
    }

    /// Map a common-library error, using `summary` for store failures
    pub fn from_common(summary: &str, err: mirage_common::Error) -> Self {
        use mirage_common::Error;

        match err {
            Error::InvalidInput(msg) => ApiError::bad_request("Invalid session", msg),
            Error::NotFound(msg) => ApiError::not_found("Session not found", msg),
            Error::Database(e) => ApiError::store(summary, e),
            Error::Serialization(e) => ApiError::store(summary, e),
            other => ApiError::Internal(other.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Store { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Generation(e) => ApiError::Upstream(e),
            FlowError::InvalidInput(msg) => ApiError::bad_request("Invalid input", msg),
            FlowError::UnknownStage(stage) => ApiError::not_found("Unknown stage", stage),
            FlowError::Encoding(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Invalid request body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error, details) = match self {
            ApiError::BadRequest { summary, details }
            | ApiError::NotFound { summary, details }
            | ApiError::Store { summary, details } => (summary, details),
            ApiError::Upstream(err) => {
                let summary = match err {
                    GenerationError::NotConfigured => "API key not configured",
                    _ => "Failed to generate images",
                };
                (summary.to_string(), err.to_string())
            }
            ApiError::Internal(msg) => ("Internal server error".to_string(), msg),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error, details = %details, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %error, details = %details, "Request rejected");
        }

        let body = Json(json!({
            "error": error,
            "details": details,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
