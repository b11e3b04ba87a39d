//! Error types for `Patio` core library.

use thiserror::Error;

/// Result type alias using `Patio` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `Patio` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A deployment secret was not supplied
    #[error("Secret {0} is not set (expected {0} or {0}_FILE)")]
    MissingSecret(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
