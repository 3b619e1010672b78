//! Error types for cueclock-td
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the timing daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tick scheduler lifecycle errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Subscription management errors
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Errors bubbling up from the common library
    #[error(transparent)]
    Common(#[from] cueclock_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the timing daemon Error
pub type Result<T> = std::result::Result<T, Error>;
