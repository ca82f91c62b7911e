//! Error types for SnapFeed
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// The first three variants are the feed core's own taxonomy; the rest
/// belong to the service wrapped around it.
#[derive(Debug, Error)]
pub enum AppError {
    /// A remote call failed or returned a non-success status (502)
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// A feed record could not be decoded
    ///
    /// Recovered locally by the strategies; only surfaces if a caller
    /// decodes a record directly.
    #[error("Malformed record {identifier}: {reason}")]
    MalformedRecord { identifier: String, reason: String },

    /// Unknown filter mode or otherwise unusable feed configuration (400)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Session not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::TransportFailure(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Short label used for the error metric and the JSON body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::TransportFailure(_) => "transport_failure",
            AppError::MalformedRecord { .. } => "malformed_record",
            AppError::InvalidConfiguration(_) => "invalid_configuration",
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::TransportFailure(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::InvalidConfiguration(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::MalformedRecord { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
