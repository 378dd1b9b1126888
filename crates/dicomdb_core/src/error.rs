//! Error types for dicomdb core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in dicomdb core operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Attribute codec error.
    #[error("codec error: {0}")]
    Codec(#[from] dicomdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Navigation outside a record's valid generation range.
    #[error("invalid hierarchy: {message}")]
    InvalidHierarchy {
        /// Description of the invalid request.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Pixel volume and header record shapes disagree.
    #[error("shape mismatch: expected {expected} slices, got {actual}")]
    ShapeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// No record matches the given identifiers.
    #[error("record not found: {message}")]
    NotFound {
        /// Description of what was looked up.
        message: String,
    },

    /// The database session is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid database folder or configuration.
    #[error("invalid database: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A bulk operation finished with individual file failures.
    ///
    /// Rows belonging to the failed files keep their prior staged
    /// state; everything else went through.
    #[error("{operation} incomplete: {failed} file(s) failed")]
    Incomplete {
        /// The operation that partially failed.
        operation: String,
        /// Number of files that failed.
        failed: usize,
    },
}

impl DbError {
    /// Creates an invalid hierarchy error.
    pub fn invalid_hierarchy(message: impl Into<String>) -> Self {
        Self::InvalidHierarchy {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an incomplete-operation error.
    pub fn incomplete(operation: impl Into<String>, failed: usize) -> Self {
        Self::Incomplete {
            operation: operation.into(),
            failed,
        }
    }
}
