//! Error types for the xiphos library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`XiphosError`] enum. Constructor helpers exist for the common kinds so
//! call sites stay short.

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors (file operations, storage backends).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The query was rejected by the parser or the validator.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A referenced object id is absent in storage.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A segment lookup or pipeline call failed during query execution.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Index-related errors (segment lifecycle, merge, manifest).
    #[error("Index error: {0}")]
    Index(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The query was cancelled between execution steps.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Generic anyhow error.
    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`XiphosError`].
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new invalid-query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        XiphosError::InvalidQuery(msg.into())
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        XiphosError::NotFound(msg.into())
    }

    /// Create a new execution error.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        XiphosError::Execution(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        XiphosError::Index(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        XiphosError::Cancelled(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = XiphosError::invalid_query("unknown selector 'doc'");
        assert_eq!(error.to_string(), "Invalid query: unknown selector 'doc'");

        let error = XiphosError::not_found("object 'abc'");
        assert_eq!(error.to_string(), "Not found: object 'abc'");

        let error = XiphosError::index("segment missing");
        assert_eq!(error.to_string(), "Index error: segment missing");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = XiphosError::from(io_error);

        match error {
            XiphosError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
