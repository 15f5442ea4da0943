//! Error types for the control-server client.
//!
//! Splits failures into transport problems (the engine is unreachable or
//! answered with something unusable) and application rejections (the engine
//! answered `success: false`).

use thiserror::Error;

/// Errors that can occur when talking to the bot control server.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Connection refused, reset, DNS failure and similar.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Server answered with a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body, if any.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request body could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Server processed the command and reported `success: false`.
    #[error("rejected by server: {message}")]
    Rejected {
        /// Server-supplied reason.
        message: String,
    },
}

impl ControlError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rejection carrying the server's message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns true when the engine should be considered down.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Rejected { .. } | Self::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for control-server operations.
pub type Result<T> = std::result::Result<T, ControlError>;
