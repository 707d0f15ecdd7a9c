//! Error types for the Callgate limiter.

use thiserror::Error;

/// Main error type for Callgate operations.
///
/// Quota exhaustion is not an error: `check` reports it as `Ok(false)`.
#[derive(Error, Debug)]
pub enum CallgateError {
    /// The shared store could not be reached or rejected a command
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller identity could not be resolved
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for CallgateError {
    fn from(err: redis::RedisError) -> Self {
        CallgateError::StoreUnavailable(err.to_string())
    }
}

impl From<config::ConfigError> for CallgateError {
    fn from(err: config::ConfigError) -> Self {
        CallgateError::Config(err.to_string())
    }
}

/// Result type alias for Callgate operations.
pub type Result<T> = std::result::Result<T, CallgateError>;
