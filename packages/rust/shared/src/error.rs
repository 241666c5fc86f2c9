//! Error types for ttabkit.
//!
//! Library crates use [`TtabError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ttabkit operations.
#[derive(Debug, thiserror::Error)]
pub enum TtabError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Missing or rejected credential for an external API.
    #[error("authentication error: {message}")]
    Auth { message: String },

    /// Transport-level failure (timeout, connection reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status that is not an authentication failure.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// XML or JSON payload could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Archive could not be opened or extracted.
    #[error("archive error: {message}")]
    Archive { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Tabular export error.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad window, invalid option combination, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TtabError>;

impl TtabError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an authentication error from any displayable message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an archive error from any displayable message.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive {
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

    /// Map a non-success HTTP status to an error. 401 and 403 become [`TtabError::Auth`].
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        match status {
            401 | 403 => Self::auth(format!("HTTP {status} from {url}: credential rejected")),
            _ => Self::Http { status, url },
        }
    }

    /// Transient failures worth another attempt: transport errors, 429, and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Failures that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
