//! Error types for the modkey service core

use thiserror::Error;

/// Result type alias for the modkey core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the key and OAuth subsystems
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or forbidden payload, disabled feature, or provider
    /// exchange failure. Recoverable by the caller with corrected input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A custom key id collided with an existing record. Specialization of
    /// [`Error::Validation`]; the store is left unchanged.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A non-admin attempted an admin-only action. Never retried.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// HTTP status the routing layer should translate this error to.
    ///
    /// Duplicate keys surface as 400 like any other validation failure.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::DuplicateKey(_) => 400,
            Self::Authorization(_) => 403,
            Self::Http(_) => 502,
            _ => 500,
        }
    }

    /// Returns `true` for the validation family (including duplicates).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateKey(_))
    }
}
