//! Error types for Tinyjail

use thiserror::Error;

/// Tinyjail error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Target process does not exist (or its /proc entry is gone)
    #[error("Process not found: {pid}")]
    ProcessNotFound {
        /// Process that was looked up
        pid: i32,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

/// Result type alias for Tinyjail operations
pub type Result<T> = std::result::Result<T, Error>;
