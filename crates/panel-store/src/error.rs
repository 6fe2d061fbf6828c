//! Error types for the persistence layer.

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Underlying SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Core domain error (validation, status parsing)
    #[error(transparent)]
    Core(#[from] panel_core::Error),

    /// JSON (de)serialization of stored payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity lookup failed
    #[error("{what} not found: {key}")]
    NotFound {
        /// Entity kind ("report", "version", ...)
        what: &'static str,
        /// Key that was looked up
        key: String,
    },

    /// A unique constraint would be violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invite code missing, claimed, or malformed
    #[error("Invalid invite code: {0}")]
    InvalidInvite(String),

    /// Attached log failed verification
    #[error("Bad log attachment '{filename}': {message}")]
    BadLog {
        /// Declared filename
        filename: String,
        /// What failed
        message: String,
    },
}

/// Convenience `Result` type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a not-found error.
    pub fn not_found<K: Into<String>>(what: &'static str, key: K) -> Self {
        Error::NotFound {
            what,
            key: key.into(),
        }
    }
}
