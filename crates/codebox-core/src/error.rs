//! Error types for codebox-core.

use crate::{InterpreterKind, SessionId};
use thiserror::Error;

/// Result type alias for codebox-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during sandbox operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No sandbox registered under this session
    #[error("sandbox not found: {0}")]
    NotFound(SessionId),

    /// Session id already in use
    #[error("sandbox already exists: {0}")]
    AlreadyExists(SessionId),

    /// Registry is full
    #[error("max sandbox limit reached ({0})")]
    LimitReached(usize),

    /// Session id has an invalid shape
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// Path is malformed or escapes the sandbox
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Language name not recognised at all
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// Backend cannot run this language
    #[error("language {language} is not supported by the {interpreter} interpreter")]
    UnsupportedLanguage {
        /// Requested language
        language: String,
        /// Backend that refused it
        interpreter: InterpreterKind,
    },

    /// e2b backend selected without credentials
    #[error("E2B API key is not configured (set E2B_API_KEY)")]
    MissingApiKey,

    /// Remote sandbox API returned an error status
    #[error("sandbox API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Operation did not finish in time
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Sandbox was already closed
    #[error("sandbox is closed")]
    Closed,

    /// Chart request failed validation or produced no image
    #[error("invalid chart request: {0}")]
    InvalidChart(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
