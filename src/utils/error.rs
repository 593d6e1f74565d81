//! Error handling module
//!
//! Session-scoped stream errors and the HTTP-facing application error

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shown when nothing more specific is known about a failure
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Errors scoped to one (config, model) session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Missing base URL, API key or model identifier
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider kind outside the supported set
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Connection, DNS or read failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured error returned by the remote endpoint
    #[error("Provider error: {message}")]
    Provider {
        /// HTTP status, absent for errors reported inside the stream
        status: Option<u16>,
        message: String,
    },

    /// The caller aborted the send
    #[error("Request cancelled")]
    Cancelled,

    /// The session outlived its time budget
    #[error("Session timed out after {0}s")]
    Timeout(u64),
}

impl StreamError {
    /// Short text for end users
    pub fn user_message(&self) -> String {
        let message = match self {
            StreamError::Configuration(msg) | StreamError::Transport(msg) => msg.clone(),
            StreamError::Provider { message, .. } => message.clone(),
            StreamError::UnsupportedProvider(_) | StreamError::Cancelled | StreamError::Timeout(_) => {
                self.to_string()
            }
        };

        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::Configuration(_) => "configuration_error",
            StreamError::UnsupportedProvider(_) => "unsupported_provider_error",
            StreamError::Transport(_) => "transport_error",
            StreamError::Provider { .. } => "provider_error",
            StreamError::Cancelled => "cancelled",
            StreamError::Timeout(_) => "timeout_error",
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Request validation failed
    #[error("Request validation failed: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Upstream provider failure
    #[error("{}", .0.user_message())]
    Stream(#[from] StreamError),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub error: ErrorDetail,
}

/// Error details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl AppError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Stream(err) => match err {
                StreamError::Configuration(_) | StreamError::UnsupportedProvider(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                StreamError::Transport(_) | StreamError::Provider { .. } => StatusCode::BAD_GATEWAY,
                StreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                StreamError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "invalid_request_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Stream(err) => err.kind(),
            AppError::Config(_) | AppError::Internal(_) => "api_error",
        }
    }

    /// Convert to the JSON error body
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            response_type: "error".to_string(),
            error: ErrorDetail {
                error_type: self.error_type().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Application error: {} - Status code: {}", self, status);
        } else {
            tracing::warn!("Client error: {} - Status code: {}", self.error_type(), status);
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_priority() {
        let provider = StreamError::Provider {
            status: Some(401),
            message: "Incorrect API key provided".to_string(),
        };
        assert_eq!(provider.user_message(), "Incorrect API key provided");

        let transport = StreamError::Transport("connection refused".to_string());
        assert_eq!(transport.user_message(), "connection refused");

        let empty = StreamError::Provider {
            status: None,
            message: String::new(),
        };
        assert_eq!(empty.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_stream_error_display() {
        assert_eq!(StreamError::Cancelled.to_string(), "Request cancelled");
        assert_eq!(StreamError::Timeout(30).user_message(), "Session timed out after 30s");
        assert_eq!(
            StreamError::UnsupportedProvider("anthropic".to_string()).user_message(),
            "Unsupported provider: anthropic"
        );
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Validation("x".to_string()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".to_string()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(StreamError::Transport("x".to_string())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(StreamError::Configuration("x".to_string())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_error_response_body() {
        let error = AppError::from(StreamError::Provider {
            status: Some(404),
            message: "The model does not exist".to_string(),
        });
        let body = error.to_error_response();

        assert_eq!(body.response_type, "error");
        assert_eq!(body.error.error_type, "provider_error");
        assert_eq!(body.error.message, "The model does not exist");
    }
}
