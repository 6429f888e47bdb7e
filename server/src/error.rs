//! Server error handling
//!
//! Startup and connection failures. Request-level failures stay inside
//! [`tern_core::Error`] and are answered with a status code instead.

use std::io;
use thiserror::Error;

use tern_core::RouteRegistrationError;

/// Tern error type covering startup and connection failures
#[derive(Debug, Error)]
pub enum TernError {
    /// Listener and address errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Route table could not be built
    #[error("Routing error: {0}")]
    Routing(#[from] RouteRegistrationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient Result type for Tern operations
pub type TernResult<T> = Result<T, TernError>;
