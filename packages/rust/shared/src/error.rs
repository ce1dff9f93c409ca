//! Error types for apiscout.
//!
//! Library crates use [`ApiScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only `Config` (and I/O on the input file) abort an analysis run. A failed
//! (extractor, window) invocation is recorded as a partial failure by the
//! coordinator and never propagates as a fatal error.

use std::path::PathBuf;

/// Top-level error type for all apiscout operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiScoutError {
    /// Configuration loading or validation error. Fatal: surfaced before
    /// any extraction begins.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the LLM provider.
    #[error("network error: {0}")]
    Network(String),

    /// Response or candidate parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ApiScoutError>;

impl ApiScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ApiScoutError::config("overlap must be smaller than window_size");
        assert_eq!(
            err.to_string(),
            "config error: overlap must be smaller than window_size"
        );

        let err = ApiScoutError::parse("response is not an endpoints document");
        assert!(err.to_string().contains("endpoints document"));
    }
}
