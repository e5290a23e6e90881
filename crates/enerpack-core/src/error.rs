//! Unified error types for the enerpack ecosystem
//!
//! This module provides a common error type [`EnerpackError`] that can
//! represent errors from any part of the system. Domain-specific error types
//! can be converted to `EnerpackError` for uniform error handling at API
//! boundaries.
//!
//! # Example
//!
//! ```ignore
//! use enerpack_core::{EnerpackError, EnerpackResult};
//!
//! fn load_system(path: &str) -> EnerpackResult<()> {
//!     let system = deserialize_package(path)?;
//!     hand_to_solver(&system)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all enerpack operations.
///
/// This enum provides a common error representation for the enerpack
/// ecosystem, allowing errors from I/O, parsing, facade construction, and
/// validation to be handled uniformly.
#[derive(Error, Debug)]
pub enum EnerpackError {
    /// I/O errors (file access, directory traversal, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors (malformed CSV or JSON resources)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors (duplicate labels, infeasible bounds,
    /// inconsistent time indices)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Facade/typemap construction errors
    #[error("Build error: {0}")]
    Build(String),

    /// Graph structure errors (missing buses, dangling references)
    #[error("Graph error: {0}")]
    Graph(String),

    /// Configuration errors (bad typemap or attribute map entries)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using EnerpackError.
pub type EnerpackResult<T> = Result<T, EnerpackError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for EnerpackError {
    fn from(err: anyhow::Error) -> Self {
        EnerpackError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for EnerpackError {
    fn from(s: String) -> Self {
        EnerpackError::Other(s)
    }
}

impl From<&str> for EnerpackError {
    fn from(s: &str) -> Self {
        EnerpackError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for EnerpackError {
    fn from(err: serde_json::Error) -> Self {
        EnerpackError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnerpackError::Validation("storage potential exceeded".into());
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("storage potential exceeded"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let pk_err: EnerpackError = io_err.into();
        assert!(matches!(pk_err, EnerpackError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> EnerpackResult<()> {
            Err(EnerpackError::Build("unknown type tag".into()))
        }

        fn outer() -> EnerpackResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
