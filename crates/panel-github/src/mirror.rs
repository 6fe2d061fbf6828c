//! The commit mirror itself.
//!
//! Fetches commit history for the emulator repository from the GitHub API,
//! incrementally: only commits newer than the newest cached one are listed,
//! and per-commit file details are requested once per commit, ever. All
//! state lives in the [`MirrorCache`] file; the lock keeps concurrent panel
//! processes from duplicating fetch work.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::cache::MirrorCache;
use crate::error::{Error, Result};
use crate::lock::CacheLock;
use crate::types::{CommitInfo, FileChanges};

/// Default freshness window between GitHub fetches.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Commits listed per page; GitHub's maximum.
const PER_PAGE: usize = 100;

/// Upper bound on detail fetches in one refresh. History older than this
/// backfills across later refreshes instead of stalling a request.
const MAX_DETAILS_PER_REFRESH: usize = 200;

/// Incremental, cached view of one repository's commit history.
pub struct CommitMirror {
    repo: String,
    base_url: String,
    token: Option<String>,
    ttl_secs: i64,
    cache_path: PathBuf,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListedCommit {
    sha: String,
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
    committer: Option<CommitSignature>,
    author: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    files: Vec<ChangedFile>,
}

#[derive(Debug, Deserialize)]
struct ChangedFile {
    filename: String,
    status: String,
}

impl CommitBody {
    fn committed_at(&self) -> DateTime<Utc> {
        self.committer
            .as_ref()
            .or(self.author.as_ref())
            .map(|s| s.date)
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }
}

impl CommitMirror {
    /// Mirror `owner/repo` into the cache file at `cache_path`.
    pub fn new(repo: impl Into<String>, cache_path: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("steam-test-panel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            repo: repo.into(),
            base_url: "https://api.github.com".to_string(),
            token: None,
            ttl_secs: DEFAULT_TTL_SECS,
            cache_path: cache_path.into(),
            client,
        })
    }

    /// Authenticate requests with a GitHub token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Override the freshness window.
    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Point at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The mirrored history, refreshed from GitHub when stale.
    ///
    /// Serves the cached history unchanged when it is fresh, when another
    /// process holds the fetch lock, or when GitHub is unreachable and a
    /// cache exists at all.
    pub async fn revisions(&self) -> Result<BTreeMap<String, CommitInfo>> {
        let mut cache = self.load_cache();
        if cache.is_fresh(self.ttl_secs) {
            return Ok(cache.commits);
        }

        let Some(_lock) = CacheLock::acquire(&self.cache_path)? else {
            log::debug!("commit cache locked by another process, serving cached history");
            return Ok(cache.commits);
        };

        match self.fetch_new(&cache).await {
            Ok(new_commits) => {
                let fetched = new_commits.len();
                cache.absorb(new_commits);
                cache.save(&self.cache_path)?;
                if fetched > 0 {
                    log::info!("mirrored {fetched} new commit(s) from {}", self.repo);
                }
            }
            Err(e) if !cache.commits.is_empty() => {
                log::warn!("commit fetch from {} failed, serving stale cache: {e}", self.repo);
            }
            Err(e) => return Err(e),
        }
        Ok(cache.commits)
    }

    fn load_cache(&self) -> MirrorCache {
        match MirrorCache::load(&self.cache_path, &self.repo) {
            Ok(Some(cache)) => cache,
            Ok(None) => MirrorCache::empty(&self.repo),
            Err(e) => {
                log::warn!(
                    "unreadable commit cache at {}, starting over: {e}",
                    self.cache_path.display()
                );
                MirrorCache::empty(&self.repo)
            }
        }
    }

    async fn fetch_new(&self, cache: &MirrorCache) -> Result<Vec<(String, CommitInfo)>> {
        let since = (cache.newest_ts > 0)
            .then(|| Utc.timestamp_opt(cache.newest_ts + 1, 0).single())
            .flatten();

        let mut listed = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(since, page).await?;
            let len = batch.len();
            for commit in batch {
                if !cache.commits.contains_key(&commit.sha) {
                    listed.push(commit);
                }
            }
            if len < PER_PAGE || listed.len() >= MAX_DETAILS_PER_REFRESH {
                break;
            }
            page += 1;
        }
        listed.truncate(MAX_DETAILS_PER_REFRESH);

        let mut out = Vec::with_capacity(listed.len());
        for commit in listed {
            let files = self.fetch_files(&commit.sha).await?;
            let at = commit.commit.committed_at();
            out.push((commit.sha, CommitInfo::new(commit.commit.message, files, at)));
        }
        Ok(out)
    }

    async fn list_page(&self, since: Option<DateTime<Utc>>, page: usize) -> Result<Vec<ListedCommit>> {
        let url = format!("{}/repos/{}/commits", self.base_url, self.repo);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())]);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_files(&self, sha: &str) -> Result<FileChanges> {
        let url = format!("{}/repos/{}/commits/{sha}", self.base_url, self.repo);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        let detail: CommitDetail = response.json().await?;

        let mut files = FileChanges::default();
        for file in detail.files {
            files.record(&file.status, file.filename);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listed_commit_deserializes_github_shape() {
        let payload = json!([{
            "sha": "abc1234def",
            "commit": {
                "message": "Fix CM chat routing\n\nLong body here.",
                "committer": {"name": "dev", "date": "2026-03-14T09:26:53Z"},
                "author": {"name": "dev", "date": "2026-03-14T09:00:00Z"}
            },
            "html_url": "https://github.com/x/y/commit/abc1234def"
        }]);
        let commits: Vec<ListedCommit> = serde_json::from_value(payload).expect("parse");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, "abc1234def");
        assert_eq!(
            commits[0].commit.committed_at().timestamp(),
            DateTime::parse_from_rfc3339("2026-03-14T09:26:53Z").unwrap().timestamp()
        );
    }

    #[test]
    fn test_committed_at_falls_back_to_author() {
        let body: CommitBody = serde_json::from_value(json!({
            "message": "no committer",
            "author": {"date": "2026-01-01T00:00:00Z"}
        }))
        .expect("parse");
        assert_eq!(body.committed_at().timestamp(), 1767225600);
    }

    #[test]
    fn test_detail_without_files_is_empty() {
        let detail: CommitDetail = serde_json::from_value(json!({"sha": "abc"})).expect("parse");
        assert!(detail.files.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_with_empty_cache_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mirror = CommitMirror::new("steamemu/server", dir.path().join("commits.json"))
            .expect("mirror")
            .with_base_url("http://127.0.0.1:1");
        assert!(mirror.revisions().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_serves_existing_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache_path = dir.path().join("commits.json");

        let mut cache = MirrorCache::empty("steamemu/server");
        cache.absorb([(
            "abc".to_string(),
            CommitInfo::new("cached".to_string(), FileChanges::default(), Utc::now()),
        )]);
        cache.fetched_at = String::new(); // force a refresh attempt
        cache.save(&cache_path).expect("save");

        let mirror = CommitMirror::new("steamemu/server", &cache_path)
            .expect("mirror")
            .with_base_url("http://127.0.0.1:1");
        let commits = mirror.revisions().await.expect("stale cache served");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits["abc"].notes, "cached");
    }
}
