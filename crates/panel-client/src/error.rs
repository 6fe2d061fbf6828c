//! Error types for the panel client.

use std::path::PathBuf;

/// Errors that can occur while talking to the panel.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error on config, cache or a log file
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed JSON in a file or response body
    #[error("Parse error: {0}")]
    Parse(String),

    /// The panel answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// The envelope's error message, or the raw body
        message: String,
    },

    /// Invalid client configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience `Result` type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an I/O error tagged with its path.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Creates a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// True when the failure looks like a connectivity problem rather
    /// than a server-side rejection.
    pub fn is_offline(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
