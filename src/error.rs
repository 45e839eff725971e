//! Error types for dns-failover.

use thiserror::Error;

/// Errors that can occur while running the failover controller.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// IO error (reading the event, config file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to a backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be loaded.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// A configured name is not a valid DNS name.
    #[error("Invalid DNS name: {0}")]
    InvalidName(#[from] hickory_proto::ProtoError),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },
}
