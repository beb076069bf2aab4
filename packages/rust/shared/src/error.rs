//! Error types for docdigest.
//!
//! Library crates use [`DigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docdigest operations.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Text extraction failed for a single file.
    #[error("extraction error at {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// Network/HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// The language-model backend reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The language-model backend answered with empty or blank content.
    #[error("backend returned an empty response for prompt: {prompt_head}")]
    EmptyResponse { prompt_head: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (bad chunk sizes, empty answer list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The reducer hit its level cap without reaching a single answer.
    #[error("reduction did not converge after {levels} levels ({remaining} answers left)")]
    ReductionDidNotConverge { levels: usize, remaining: usize },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DigestError>;

/// Number of prompt characters kept in [`DigestError::EmptyResponse`].
const PROMPT_HEAD_CHARS: usize = 100;

impl DigestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction error for `path`.
    pub fn extraction(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
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

    /// Empty-response error carrying the head of the offending prompt.
    pub fn empty_response(prompt: &str) -> Self {
        Self::EmptyResponse {
            prompt_head: prompt.chars().take(PROMPT_HEAD_CHARS).collect(),
        }
    }
}
