//! Errors raised at the backend request boundary.

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ValidationError;

/// Errors that can occur while talking to the labeling backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not complete (offline, timeout, TLS, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Response body did not match the expected format
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Local file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload or input violated a contract
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration is not usable for this request
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Human-readable message stored in the shared error state.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Connection(_) => {
                "Could not reach the labeling service. Please try again.".to_string()
            }
            ApiError::Status { status, body } if status.is_server_error() => {
                format!("The labeling service failed ({}). {}", status, first_line(body))
                    .trim_end()
                    .to_string()
            }
            ApiError::Status { status, body } => {
                let detail = first_line(body);
                if detail.is_empty() {
                    format!("Request rejected ({})", status)
                } else {
                    format!("Request rejected ({}): {}", status, detail)
                }
            }
            other => other.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        match self {
            ApiError::Connection(_) => true,
            ApiError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or("").trim()
}
