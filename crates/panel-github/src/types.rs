//! Wire types for mirrored commit history.
//!
//! The shapes here are what the panel serves to the tool: a map from commit
//! sha to its message, changed files, and timestamp. `datetime` is the
//! human-readable form the tool displays (`%Y-%m-%d %H:%M:%S`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Files touched by one commit, grouped by change kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    /// Paths added.
    #[serde(default)]
    pub added: Vec<String>,
    /// Paths removed.
    #[serde(default)]
    pub removed: Vec<String>,
    /// Paths modified or renamed.
    #[serde(default)]
    pub modified: Vec<String>,
}

impl FileChanges {
    /// Total changed path count.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Whether the commit touched no files the mirror saw.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one file by its GitHub change status string.
    pub fn record(&mut self, status: &str, path: String) {
        match status {
            "added" => self.added.push(path),
            "removed" => self.removed.push(path),
            // Renames count as modifications of the new path.
            _ => self.modified.push(path),
        }
    }
}

/// One mirrored commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit message.
    pub notes: String,
    /// Changed files.
    pub files: FileChanges,
    /// Commit time as unix seconds.
    pub ts: i64,
    /// Commit time as `%Y-%m-%d %H:%M:%S` UTC.
    pub datetime: String,
}

impl CommitInfo {
    /// Build a commit entry from its message and commit instant.
    pub fn new(notes: String, files: FileChanges, at: DateTime<Utc>) -> Self {
        Self {
            notes,
            files,
            ts: at.timestamp(),
            datetime: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
