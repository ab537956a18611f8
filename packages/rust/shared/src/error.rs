//! Error types for Newsloom.
//!
//! Library crates use [`NewsloomError`] via `thiserror`.
//! The worker binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Newsloom operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsloomError {
    /// Configuration loading or validation error. Fatal at startup:
    /// the worker reports and exits rather than retrying.
    #[error("config error: {message}")]
    Config { message: String },

    /// A transient provider error (rate/quota exceeded). Eligible for
    /// bounded exponential-backoff retry.
    #[error("transient error during {operation}: {message}")]
    Transient { operation: String, message: String },

    /// The retry budget for a transient error ran out. Wraps the last
    /// underlying error; caught per record by the scheduler.
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<NewsloomError>,
    },

    /// Terminal provider-side error (bad response, network failure on a
    /// local endpoint). Providers convert this to an empty result.
    #[error("provider error: {0}")]
    Provider(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (malformed ingest payload, bad field).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsloomError>;

impl NewsloomError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a transient error for the given operation.
    pub fn transient(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a retries-exhausted error wrapping the last failure.
    pub fn retries_exhausted(operation: impl Into<String>, attempts: u32, last: Self) -> Self {
        Self::RetriesExhausted {
            operation: operation.into(),
            attempts,
            source: Box::new(last),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is expected to resolve itself after waiting
    /// (the only class the retry policy will re-attempt).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
