//! Persistent client cache for offline operation.
//!
//! Mirrors the catalog (versions, tests, categories) and queues
//! submissions made while the panel is unreachable. The whole cache is a
//! single JSON file; a version field lets the format change without
//! migration code — an old cache is simply discarded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Bump when the cache layout changes.
pub const CACHE_VERSION: u32 = 1;

/// Default cache filename next to the config.
pub const DEFAULT_CACHE_FILE: &str = "test_panel_cache.json";

/// A report waiting to be submitted when the panel comes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSubmission {
    /// Queue id, assigned locally.
    pub id: String,
    /// Source file the payload came from, if any.
    pub file_path: String,
    /// The cleaned payload, ready to post as-is.
    pub data: Value,
    /// When the report was queued.
    pub created_at: String,
    /// Submission attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Error from the last attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Connection status bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Last check reached the panel.
    #[serde(default)]
    pub is_online: bool,
    /// When the panel was last reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_online: Option<String>,
    /// When connectivity was last probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheData {
    cache_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_sync: Option<String>,
    #[serde(default)]
    versions: Vec<Value>,
    #[serde(default)]
    tests: Vec<Value>,
    #[serde(default)]
    categories: Vec<Value>,
    /// Version id → pinned battery for that version.
    #[serde(default)]
    version_tests: BTreeMap<String, Vec<Value>>,
    /// Version id → tests that do not apply.
    #[serde(default)]
    version_skip_tests: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pending_submissions: Vec<PendingSubmission>,
    #[serde(default)]
    connection_status: ConnectionStatus,
}

impl Default for CacheData {
    fn default() -> Self {
        Self {
            cache_version: CACHE_VERSION,
            last_sync: None,
            versions: Vec::new(),
            tests: Vec::new(),
            categories: Vec::new(),
            version_tests: BTreeMap::new(),
            version_skip_tests: BTreeMap::new(),
            pending_submissions: Vec::new(),
            connection_status: ConnectionStatus::default(),
        }
    }
}

/// The on-disk cache plus its path and dirty flag.
#[derive(Debug)]
pub struct DataCache {
    path: PathBuf,
    data: CacheData,
    dirty: bool,
}

impl DataCache {
    /// Open the cache at `path`, starting empty when the file is missing
    /// or its version does not match.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match Self::read(&path) {
            Ok(Some(data)) => {
                log::info!(
                    "loaded cache from {} ({} versions, {} tests, {} pending)",
                    path.display(),
                    data.versions.len(),
                    data.tests.len(),
                    data.pending_submissions.len()
                );
                data
            }
            Ok(None) => CacheData::default(),
            Err(e) => {
                log::warn!("failed to load cache, starting empty: {e}");
                CacheData::default()
            }
        };
        Self {
            path,
            data,
            dirty: false,
        }
    }

    fn read(path: &Path) -> Result<Option<CacheData>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, path)),
        };
        let data: CacheData =
            serde_json::from_str(&raw).map_err(|e| Error::parse(e.to_string()))?;
        if data.cache_version != CACHE_VERSION {
            log::warn!(
                "cache version mismatch ({} != {CACHE_VERSION}), discarding",
                data.cache_version
            );
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Persist if anything changed. Writes atomically via a temp file.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent))?;
        }
        let raw = serde_json::to_string_pretty(&self.data)
            .map_err(|e| Error::parse(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| Error::io(e, &tmp))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::io(e, &self.path))?;
        self.dirty = false;
        Ok(())
    }

    /// Cached version list.
    pub fn versions(&self) -> &[Value] {
        &self.data.versions
    }

    /// Replace the cached version list.
    pub fn set_versions(&mut self, versions: Vec<Value>) {
        self.data.versions = versions;
        self.data.last_sync = Some(Utc::now().to_rfc3339());
        self.dirty = true;
    }

    /// Cached general test list.
    pub fn tests(&self) -> &[Value] {
        &self.data.tests
    }

    /// Cached categories.
    pub fn categories(&self) -> &[Value] {
        &self.data.categories
    }

    /// Replace the cached test list and categories.
    pub fn set_tests(&mut self, tests: Vec<Value>, categories: Vec<Value>) {
        self.data.tests = tests;
        self.data.categories = categories;
        self.data.last_sync = Some(Utc::now().to_rfc3339());
        self.dirty = true;
    }

    /// Version-specific battery, when one was cached.
    pub fn version_tests(&self, version_id: &str) -> Option<&[Value]> {
        self.data.version_tests.get(version_id).map(Vec::as_slice)
    }

    /// Skip list for one version.
    pub fn version_skip_tests(&self, version_id: &str) -> &[String] {
        self.data
            .version_skip_tests
            .get(version_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cache a version's battery together with its skip list.
    pub fn set_version_tests(
        &mut self,
        version_id: &str,
        tests: Vec<Value>,
        skip_tests: Vec<String>,
    ) {
        self.data
            .version_tests
            .insert(version_id.to_string(), tests);
        self.data
            .version_skip_tests
            .insert(version_id.to_string(), skip_tests);
        self.dirty = true;
    }

    /// Queue a payload for later submission, returning its queue id.
    pub fn add_pending(&mut self, file_path: &str, data: Value) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.data.pending_submissions.push(PendingSubmission {
            id: id.clone(),
            file_path: file_path.to_string(),
            data,
            created_at: Utc::now().to_rfc3339(),
            attempts: 0,
            last_error: None,
        });
        self.dirty = true;
        id
    }

    /// Everything waiting to go out.
    pub fn pending(&self) -> &[PendingSubmission] {
        &self.data.pending_submissions
    }

    /// Drop a queued submission. Returns false when the id is unknown.
    pub fn remove_pending(&mut self, id: &str) -> bool {
        let before = self.data.pending_submissions.len();
        self.data.pending_submissions.retain(|p| p.id != id);
        let removed = self.data.pending_submissions.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Record a failed attempt on a queued submission.
    pub fn update_pending(&mut self, id: &str, attempts: u32, error: Option<String>) {
        if let Some(pending) = self
            .data
            .pending_submissions
            .iter_mut()
            .find(|p| p.id == id)
        {
            pending.attempts = attempts;
            pending.last_error = error;
            self.dirty = true;
        }
    }

    /// Record the outcome of a connectivity check.
    pub fn set_online(&mut self, online: bool) {
        let now = Utc::now().to_rfc3339();
        self.data.connection_status.last_check = Some(now.clone());
        if online {
            self.data.connection_status.last_online = Some(now);
        }
        self.data.connection_status.is_online = online;
        self.dirty = true;
    }

    /// Last recorded connection status.
    pub fn connection_status(&self) -> &ConnectionStatus {
        &self.data.connection_status
    }

    /// When the catalog was last synced from the panel.
    pub fn last_sync(&self) -> Option<&str> {
        self.data.last_sync.as_deref()
    }

    /// Whether any catalog data has ever been synced.
    pub fn has_data(&self) -> bool {
        !self.data.versions.is_empty() || !self.data.tests.is_empty()
    }
}
