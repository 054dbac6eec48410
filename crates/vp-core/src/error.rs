//! Error types for VarPass

use thiserror::Error;

/// VarPass error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration/schema error: a key used before declaration, an index
    /// outside a declared capacity, a missing calibration entry. Fatal.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numeric computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
