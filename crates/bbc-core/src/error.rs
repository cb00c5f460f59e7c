//! Unified error types for the bbc workspace
//!
//! [`BbcError`] is the common error representation at API boundaries. The
//! algorithm crate keeps its own domain errors and converts into this one
//! where a caller only needs a uniform failure.

use thiserror::Error;

/// Unified error type for instance handling and solving.
#[derive(Error, Debug)]
pub enum BbcError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Instance validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using BbcError.
pub type BbcResult<T> = Result<T, BbcError>;

impl From<anyhow::Error> for BbcError {
    fn from(err: anyhow::Error) -> Self {
        BbcError::Other(err.to_string())
    }
}

impl From<String> for BbcError {
    fn from(s: String) -> Self {
        BbcError::Other(s)
    }
}

impl From<&str> for BbcError {
    fn from(s: &str) -> Self {
        BbcError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for BbcError {
    fn from(err: serde_json::Error) -> Self {
        BbcError::Parse(err.to_string())
    }
}
