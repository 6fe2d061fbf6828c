//! Error types for the GitHub mirror.

use std::path::PathBuf;

/// Errors that can occur while mirroring commit history.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error on the cache or lock file
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed cache file or API payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// GitHub answered with a non-success status
    #[error("GitHub API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },
}

/// Convenience `Result` type alias for mirror operations.
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
}
