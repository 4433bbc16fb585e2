//! Error types for the webprobe system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::guard::GuardError;

/// Result type alias for webprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message used when an error carries no usable text
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Core error type for the webprobe system
#[derive(Error, Debug)]
pub enum Error {
    /// The host guard rejected the target
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// A check collaborator failed with a message of its own
    #[error("Check {check} failed: {message}")]
    Check {
        /// Check name
        check: String,
        /// Human-readable failure message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Subprocess errors (traceroute and friends)
    #[error("Command error: {0}")]
    Command(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a check failure
    pub fn check(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Check {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a subprocess error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The message shown to the user when this error ends a job
    ///
    /// A check's own message wins over the formatted display text, and an
    /// empty result falls back to [`UNKNOWN_ERROR`].
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Check { message, .. } => message.clone(),
            other => other.to_string(),
        };

        if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
