//! Error types for identity extraction and configuration

use thiserror::Error;

/// Identity error types.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A claim set could not be read into a principal
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
