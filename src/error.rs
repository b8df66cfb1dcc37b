//! Error types for the book reconstruction engine.
//!
//! Book operations themselves are total: malformed levels and orphan events
//! are reported through [`ApplySummary`](crate::types::ApplySummary), not
//! through errors. `BookError` covers the edges around the engine: decoding
//! capture files, routing by symbol and parsing sampler settings.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Main error type for the crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    /// Symbol not tracked by a multi-symbol session
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// A capture line that could not be decoded into a record
    #[error("Decode error at line {line}: {message}")]
    Decode { line: u64, message: String },

    /// Sampling interval string that could not be parsed (e.g. "5x")
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// I/O failure while reading a source or writing an export
    #[error("IO error: {0}")]
    Io(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl BookError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        BookError::Generic(msg.into())
    }

    /// Create a decode error for a given input line.
    pub fn decode(line: u64, message: impl Into<String>) -> Self {
        BookError::Decode {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        BookError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BookError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return BookError::Io(err.to_string());
        }
        BookError::Decode {
            line: err.line() as u64,
            message: err.to_string(),
        }
    }
}

impl From<String> for BookError {
    fn from(err: String) -> Self {
        BookError::Generic(err)
    }
}

impl From<&str> for BookError {
    fn from(err: &str) -> Self {
        BookError::Generic(err.to_string())
    }
}
