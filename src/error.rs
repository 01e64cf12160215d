//! Error types for agentcore.

use thiserror::Error;

/// Result type alias using agentcore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for agentcore
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM backend error (HTTP, auth, protocol)
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input passed to a tool or component
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found (unknown tool name, missing fallback provider, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required credential missing for a configured fallback provider
    #[error("Configuration error: missing credential: {0}")]
    MissingCredential(String),

    /// A checkpoint handler returned an error instead of a response
    #[error("Checkpoint handler error: {0}")]
    Checkpoint(String),

    /// The run was cancelled via its `CancellationToken`
    #[error("cancelled")]
    Cancelled,

    /// All configured fallback providers failed
    #[error("fallback exhausted: {0}")]
    FallbackExhausted(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Coarse classification of a [`Error`], used by the Resilient Dispatcher
/// and Recovery Analyzer instead of matching on error message substrings
/// (see Design Notes: "isolate into a single classifier returning a tagged
/// error; downstream code compares the tag, never the string").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The backend call timed out or the network deadline was exceeded.
    TimeoutLike,
    /// A recoverable API error: rate limiting, quota, transient 5xx, ...
    RecoverableApi,
    /// Everything else; not classified as retryable.
    Other,
}

impl Error {
    /// Classify this error for recovery/retry decisions.
    ///
    /// Only the `Backend`/`Http` variants are inspected for phrase content;
    /// every other variant maps to a fixed kind. This is the single place
    /// permitted to look at error text (Design Notes).
    pub fn classify(&self) -> ErrorKind {
        match self {
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Backend(msg) | Error::Checkpoint(msg) => classify_message(msg),
            Error::Http(e) => {
                if e.is_timeout() {
                    ErrorKind::TimeoutLike
                } else if e.is_status() {
                    classify_message(&e.to_string())
                } else {
                    ErrorKind::Other
                }
            }
            _ => ErrorKind::Other,
        }
    }
}

const TIMEOUT_PHRASES: &[&str] = &["context deadline exceeded", "timeout", "i/o timeout", "timed out"];

const RECOVERABLE_API_PHRASES: &[&str] = &[
    "rate_limit",
    "rate limit",
    "insufficient_quota",
    "service unavailable",
    "invalid_api_key",
    "model not found",
    "429",
    "500",
    "502",
    "503",
    "504",
];

fn classify_message(msg: &str) -> ErrorKind {
    let lower = msg.to_lowercase();
    if TIMEOUT_PHRASES.iter().any(|p| lower.contains(p)) {
        ErrorKind::TimeoutLike
    } else if RECOVERABLE_API_PHRASES.iter().any(|p| lower.contains(p)) {
        ErrorKind::RecoverableApi
    } else {
        ErrorKind::Other
    }
}
