//! On-disk commit cache.
//!
//! The mirror persists everything it has fetched as one JSON file so the
//! panel survives restarts without refetching history, and so concurrent
//! panel processes can share the fetch work through the lock in
//! [`crate::lock`]. Saves go through a temp file and rename, so readers
//! never observe a half-written cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::CommitInfo;

/// Current cache layout version; bump when the shape changes.
pub const CACHE_VERSION: u32 = 1;

/// Everything the mirror knows, as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorCache {
    /// Cache layout version.
    pub version: u32,
    /// `owner/repo` the history belongs to.
    pub repo: String,
    /// When the mirror last talked to GitHub (RFC 3339).
    pub fetched_at: String,
    /// Timestamp of the newest mirrored commit, for incremental fetches.
    pub newest_ts: i64,
    /// Mirrored commits keyed by sha.
    pub commits: BTreeMap<String, CommitInfo>,
}

impl MirrorCache {
    /// Fresh empty cache for `repo`.
    pub fn empty(repo: &str) -> Self {
        Self {
            version: CACHE_VERSION,
            repo: repo.to_string(),
            fetched_at: String::new(),
            newest_ts: 0,
            commits: BTreeMap::new(),
        }
    }

    /// Load the cache at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist, belongs to a
    /// different repo, or has an older layout version; those all mean
    /// "start over", not "fail".
    pub fn load(path: &Path, repo: &str) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, path)),
        };
        let cache: Self = serde_json::from_str(&content)
            .map_err(|e| Error::parse(format!("invalid cache JSON: {e}")))?;
        if cache.version != CACHE_VERSION || cache.repo != repo {
            log::info!(
                "discarding commit cache at {} (version {} repo {})",
                path.display(),
                cache.version,
                cache.repo
            );
            return Ok(None);
        }
        Ok(Some(cache))
    }

    /// Persist atomically next to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent))?;
            }
        }
        let tmp = tmp_path(path);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::parse(format!("cache serialization failed: {e}")))?;
        std::fs::write(&tmp, content).map_err(|e| Error::io(e, &tmp))?;
        std::fs::rename(&tmp, path).map_err(|e| Error::io(e, path))?;
        Ok(())
    }

    /// Whether the last fetch is younger than `ttl_secs`.
    pub fn is_fresh(&self, ttl_secs: i64) -> bool {
        DateTime::parse_from_rfc3339(&self.fetched_at)
            .map(|fetched| {
                let age = Utc::now() - fetched.with_timezone(&Utc);
                age.num_seconds() < ttl_secs
            })
            .unwrap_or(false)
    }

    /// Fold newly fetched commits in and stamp the fetch time.
    pub fn absorb(&mut self, commits: impl IntoIterator<Item = (String, CommitInfo)>) {
        for (sha, info) in commits {
            self.newest_ts = self.newest_ts.max(info.ts);
            self.commits.insert(sha, info);
        }
        self.fetched_at = Utc::now().to_rfc3339();
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
