// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested object does not exist in the object store
    #[error("Object not found: {namespace}/{key}")]
    NotFound { namespace: String, key: String },

    /// Cursor store rejected or lost an update
    #[error("Cursor store error for table {table}: {message}")]
    CursorStore { table: String, message: String },

    /// External source failed outside a fetch cycle
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error for an object key.
    pub fn not_found(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Create a cursor store error with table context.
    pub fn cursor_store(table: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::CursorStore {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the object was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure reported by the external paged source.
///
/// Inside a fetch cycle these end the cycle early but keep partial progress.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source throttled the request.
    #[error("rate limited (resets at {reset_at:?})")]
    RateLimited { reset_at: Option<i64> },

    /// Network failure or server-side error.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Non-retryable rejection such as bad credentials.
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transient(e.to_string())
    }
}
