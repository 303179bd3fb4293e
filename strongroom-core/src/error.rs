//! Error taxonomy for the session store
//!
//! Lifecycle hooks never let these escape to the host runtime: they are
//! recorded as the last error and the hook reports failure instead.

use crate::storage::Driver;

/// Session store result type
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session store error type
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Missing or invalid configuration, detected before any database work
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver could not open a connection
    #[error("{driver} - connection failed: {message}")]
    Connection { driver: Driver, message: String },

    /// A statement failed to prepare or execute
    #[error("{driver} - {message}")]
    Query { driver: Driver, message: String },

    /// Decryption, encryption or base64 framing failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The variable buffer could not be decoded
    #[error("Codec error at offset {offset}: {message}")]
    Codec { offset: usize, message: String },

    /// A variable name the buffer format cannot represent
    #[error("Invalid session variable name '{0}': must not contain '|' or start with '!'")]
    InvalidName(String),

    /// The request fingerprint did not match the stored one
    #[error("Fingerprint mismatch: {0}")]
    FingerprintMismatch(String),

    /// Operation attempted on a closed connection
    #[error("Connection already closed")]
    Closed,
}

impl SessionError {
    pub(crate) fn query(driver: Driver, err: impl std::fmt::Display) -> Self {
        SessionError::Query { driver, message: err.to_string() }
    }

    pub(crate) fn connection(driver: Driver, err: impl std::fmt::Display) -> Self {
        SessionError::Connection { driver, message: err.to_string() }
    }

    pub(crate) fn codec(offset: usize, message: impl Into<String>) -> Self {
        SessionError::Codec { offset, message: message.into() }
    }

    /// Whether the error leaves the request without a usable database handle
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Configuration(_) | SessionError::Connection { .. } | SessionError::Closed)
    }
}
