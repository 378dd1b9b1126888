//! Error types for the attribute codec.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding instance files.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error while reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is absent, truncated, corrupt, or not a dicomdb file.
    #[error("decode error: {message}")]
    Decode {
        /// Description of what failed to decode.
        message: String,
    },

    /// Pixel buffer length disagrees with the declared grid.
    #[error("pixel shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Number of values implied by rows * columns.
        expected: usize,
        /// Number of values actually present.
        actual: usize,
    },

    /// A decoded object lacks one of the four hierarchy identifiers.
    #[error("missing hierarchy identifier: {keyword}")]
    MissingHierarchy {
        /// Keyword of the absent identifier.
        keyword: &'static str,
    },
}

impl CodecError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error.
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}
