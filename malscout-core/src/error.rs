//! Common error types for malscout

use thiserror::Error;

/// Common result type for malscout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across the analysis core
#[derive(Error, Debug)]
pub enum Error {
    /// Input bytes do not parse as a PE image. Distinct from a valid image
    /// with no imports, which is not an error.
    #[error("not a valid PE image: {0}")]
    InvalidImage(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
