//! Error types for the classifier
//!
//! Classification itself is total. Errors only arise at the boundary, when
//! text from a collaborator or from configuration is turned into typed values.

use thiserror::Error;

/// Result type alias for classifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the classifier
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed address, endpoint, prefix, record type or observation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors (config files, observation streams)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
