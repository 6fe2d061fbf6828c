//! The panel client.
//!
//! One `PanelClient` wraps the HTTP surface the panel exposes to the
//! test tool, with the offline behavior the tool depends on: catalog
//! reads fall back to the [`DataCache`] when the panel is unreachable,
//! and submissions made offline are queued there and replayed by
//! [`PanelClient::process_pending`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use panel_core::notification::Notification;
use panel_core::retest::{RetestItem, RetestKind};
use panel_core::taxonomy::{TestCategory, TestDefinition};
use panel_core::version::ClientVersion;

use crate::cache::{DataCache, DEFAULT_CACHE_FILE, PendingSubmission};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::notes::prepare_submission;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-API-Key";

/// What the panel did with a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOutcome {
    /// Stored report id.
    pub report_id: i64,
    /// Version the report is for.
    pub client_version: String,
    /// "created", "updated", or "skipped".
    pub action: String,
    /// Live revision after the submission.
    pub revision: i64,
    /// Tests in the stored payload.
    pub tests_recorded: u64,
    /// Logs attached alongside.
    pub logs_attached: u64,
    /// Tests whose status dropped in this update.
    #[serde(default)]
    pub regressions: Vec<String>,
    /// Browser link to the report.
    #[serde(default)]
    pub view_url: Option<String>,
}

/// Result of a submission attempt.
#[derive(Debug, Clone)]
pub enum SubmitResponse {
    /// The panel accepted the session; one outcome per version.
    Accepted(Vec<SubmitOutcome>),
    /// The panel was unreachable; the payload is queued under this id.
    Queued {
        /// Local queue id.
        submission_id: String,
    },
}

/// Per-version answer from the hash precheck.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionHashCheck {
    /// A report exists for this (tester, version, test type).
    pub exists: bool,
    /// The local hash matches the stored payload.
    pub hash_matches: bool,
    /// Stored payload hash, when a report exists.
    #[serde(default)]
    pub server_hash: Option<String>,
    /// Existing report id.
    #[serde(default)]
    pub report_id: Option<i64>,
    /// Archived revision count.
    #[serde(default)]
    pub revision_count: i64,
    /// What a submission would do: "create", "update", or "skip".
    pub action: String,
}

/// The test battery as served (or cached).
#[derive(Debug, Clone)]
pub struct TestsResult {
    /// Categories in display order.
    pub categories: Vec<TestCategory>,
    /// The battery.
    pub tests: Vec<TestDefinition>,
    /// Tests that do not apply to the requested version.
    pub skip_tests: Vec<String>,
    /// True when served from the offline cache.
    pub from_cache: bool,
}

/// The version list as served (or cached).
#[derive(Debug, Clone)]
pub struct VersionsResult {
    /// Versions in display order.
    pub versions: Vec<ClientVersion>,
    /// True when served from the offline cache.
    pub from_cache: bool,
}

/// Unacknowledged queue items from the lightweight poll.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagCheck {
    /// Item count.
    pub count: u64,
    /// The items themselves.
    #[serde(default)]
    pub flags: Vec<RetestItem>,
}

/// Who the key belongs to, plus the emulator commit mirror.
#[derive(Debug, Clone)]
pub struct UserInfo {
    /// Account username.
    pub username: String,
    /// "tester" or "admin".
    pub role: String,
    /// Commit sha → commit info, newest mirror state.
    pub revisions: BTreeMap<String, Value>,
}

/// Client for the panel API.
pub struct PanelClient {
    config: ClientConfig,
    http: reqwest::Client,
    cache: Mutex<DataCache>,
}

impl PanelClient {
    /// Client with the cache stored next to the current directory's
    /// default cache file.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_cache_path(config, DEFAULT_CACHE_FILE)
    }

    /// Client with an explicit cache location.
    pub fn with_cache_path(config: ClientConfig, cache_path: impl Into<PathBuf>) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::config(errors.join("; ")));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            config,
            http,
            cache: Mutex::new(DataCache::open(cache_path)),
        })
    }

    /// Client from a config file, cache next to it.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = ClientConfig::load(path)?;
        let cache_path = path
            .parent()
            .map(|dir| dir.join(DEFAULT_CACHE_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));
        Self::with_cache_path(config, cache_path)
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn cache(&self) -> MutexGuard<'_, DataCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queued submissions waiting for connectivity.
    pub fn pending_submissions(&self) -> Vec<PendingSubmission> {
        self.cache().pending().to_vec()
    }

    /// Persist the cache if anything changed.
    pub fn save_cache(&self) -> Result<()> {
        self.cache().save()
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<(u16, Value)> {
        let url = format!("{}{endpoint}", self.config.api_url);
        let mut request = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &self.config.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let value: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::parse(format!("invalid JSON from {endpoint}: {e}")))?
        };
        Ok((status, value))
    }

    /// Like [`Self::request`] but turns any non-success answer into an error.
    async fn request_ok(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let (status, value) = self.request(method, endpoint, query, body).await?;
        if (200..300).contains(&status) && value["success"] != Value::Bool(false) {
            Ok(value)
        } else {
            let message = value["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}"));
            Err(Error::Api { status, message })
        }
    }

    fn mark_online(&self, online: bool) {
        let mut cache = self.cache();
        cache.set_online(online);
        if let Err(e) = cache.save() {
            log::warn!("failed to persist cache: {e}");
        }
    }

    /// Submit a `session_results.json` file, queueing it when offline.
    pub async fn submit_file(&self, path: impl AsRef<Path>) -> Result<SubmitResponse> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        let data: Value = serde_json::from_str(&raw)
            .map_err(|e| Error::parse(format!("invalid JSON in {}: {e}", path.display())))?;
        self.submit(&path.display().to_string(), data, true).await
    }

    /// Submit session data directly.
    pub async fn submit_data(
        &self,
        data: Value,
        queue_if_offline: bool,
    ) -> Result<SubmitResponse> {
        self.submit("", data, queue_if_offline).await
    }

    async fn submit(
        &self,
        file_path: &str,
        mut data: Value,
        queue_if_offline: bool,
    ) -> Result<SubmitResponse> {
        prepare_submission(&mut data);

        match self
            .request_ok(Method::POST, "/api/submit", &[], Some(&data))
            .await
        {
            Ok(value) => {
                self.mark_online(true);
                let outcomes: Vec<SubmitOutcome> =
                    serde_json::from_value(value["reports"].clone())
                        .map_err(|e| Error::parse(format!("bad submit response: {e}")))?;
                Ok(SubmitResponse::Accepted(outcomes))
            }
            Err(e) if e.is_offline() && queue_if_offline => {
                self.mark_online(false);
                let id = {
                    let mut cache = self.cache();
                    let id = cache.add_pending(file_path, data);
                    cache.save()?;
                    id
                };
                log::warn!("panel unreachable, queued submission {id}");
                Ok(SubmitResponse::Queued { submission_id: id })
            }
            Err(e) => {
                if e.is_offline() {
                    self.mark_online(false);
                }
                Err(e)
            }
        }
    }

    /// Replay queued submissions. Returns how many went through.
    pub async fn process_pending(&self) -> Result<usize> {
        let pending = self.pending_submissions();
        if pending.is_empty() {
            return Ok(0);
        }
        log::info!("processing {} pending submission(s)", pending.len());

        let mut submitted = 0;
        for item in pending {
            match self.submit_data(item.data.clone(), false).await {
                Ok(SubmitResponse::Accepted(_)) => {
                    self.cache().remove_pending(&item.id);
                    submitted += 1;
                }
                // Queueing is disabled on the replay path, so this arm
                // only fires if that ever changes; leave the item queued.
                Ok(SubmitResponse::Queued { .. }) => {}
                Err(e) => {
                    log::warn!("pending submission {} failed: {e}", item.id);
                    self.cache()
                        .update_pending(&item.id, item.attempts + 1, Some(e.to_string()));
                    if e.is_offline() {
                        // Still offline, no point trying the rest.
                        break;
                    }
                }
            }
        }
        self.save_cache()?;
        Ok(submitted)
    }

    /// Precheck local hashes so unchanged versions can be skipped.
    pub async fn check_hashes(
        &self,
        hashes: &BTreeMap<String, String>,
        test_type: &str,
    ) -> Result<BTreeMap<String, VersionHashCheck>> {
        let body = json!({"hashes": hashes, "test_type": test_type});
        let value = self
            .request_ok(Method::POST, "/api/check_hash", &[], Some(&body))
            .await?;
        serde_json::from_value(value["results"].clone())
            .map_err(|e| Error::parse(format!("bad check_hash response: {e}")))
    }

    /// The caller's open retest queue.
    pub async fn retest_queue(&self, client_version: Option<&str>) -> Result<Vec<RetestItem>> {
        let mut query = Vec::new();
        if let Some(version) = client_version {
            query.push(("client_version", version.to_string()));
        }
        let value = self
            .request_ok(Method::GET, "/api/retests", &query, None)
            .await?;
        serde_json::from_value(value["retest_queue"].clone())
            .map_err(|e| Error::parse(format!("bad retest queue: {e}")))
    }

    /// Mark a retest item done, with the confirmed status for fixes.
    pub async fn complete_retest(
        &self,
        item: &RetestItem,
        new_status: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({"type": item.kind.as_str(), "id": item.id});
        if let Some(status) = new_status {
            body["new_status"] = json!(status);
        }
        self.request_ok(Method::POST, "/api/retests", &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Lightweight poll for unseen queue items.
    pub async fn check_flags(&self) -> Result<FlagCheck> {
        let value = self
            .request_ok(Method::GET, "/api/flag_check", &[], None)
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("bad flag_check response: {e}")))
    }

    /// Acknowledge one polled item so it stops showing up.
    pub async fn acknowledge_flag(&self, kind: RetestKind, id: i64) -> Result<()> {
        let body = json!({"type": kind.as_str(), "id": id});
        self.request_ok(Method::POST, "/api/flag_check", &[], Some(&body))
            .await?;
        Ok(())
    }

    /// The test battery, version-specific when `client_version` is set.
    /// Falls back to the cache when the panel is unreachable.
    pub async fn tests(
        &self,
        enabled_only: bool,
        client_version: Option<&str>,
    ) -> Result<TestsResult> {
        let mut query = Vec::new();
        if !enabled_only {
            query.push(("all", "1".to_string()));
        }
        if let Some(version) = client_version {
            query.push(("client_version", version.to_string()));
        }

        match self
            .request_ok(Method::GET, "/api/tests", &query, None)
            .await
        {
            Ok(value) => {
                let categories: Vec<TestCategory> =
                    serde_json::from_value(value["categories"].clone())
                        .map_err(|e| Error::parse(format!("bad categories: {e}")))?;
                let tests: Vec<TestDefinition> = serde_json::from_value(value["tests"].clone())
                    .map_err(|e| Error::parse(format!("bad tests: {e}")))?;
                let skip_tests: Vec<String> = value["skip_tests"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();

                self.mark_online(true);
                {
                    let mut cache = self.cache();
                    let raw_tests: Vec<Value> = tests
                        .iter()
                        .filter_map(|t| serde_json::to_value(t).ok())
                        .collect();
                    match client_version {
                        Some(version) => {
                            cache.set_version_tests(version, raw_tests, skip_tests.clone());
                        }
                        None => {
                            let raw_cats: Vec<Value> = categories
                                .iter()
                                .filter_map(|c| serde_json::to_value(c).ok())
                                .collect();
                            cache.set_tests(raw_tests, raw_cats);
                        }
                    }
                    cache.save()?;
                }

                Ok(TestsResult {
                    categories,
                    tests,
                    skip_tests,
                    from_cache: false,
                })
            }
            Err(e) if e.is_offline() => {
                self.mark_online(false);
                self.cached_tests(client_version).ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    fn cached_tests(&self, client_version: Option<&str>) -> Option<TestsResult> {
        let cache = self.cache();
        let (raw_tests, skip_tests) = match client_version {
            Some(version) => match cache.version_tests(version) {
                Some(tests) => (tests.to_vec(), cache.version_skip_tests(version).to_vec()),
                None => (cache.tests().to_vec(), Vec::new()),
            },
            None => (cache.tests().to_vec(), Vec::new()),
        };
        if raw_tests.is_empty() {
            return None;
        }
        let tests: Vec<TestDefinition> = raw_tests
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
        let categories: Vec<TestCategory> = cache
            .categories()
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
        log::info!("serving {} test(s) from offline cache", tests.len());
        Some(TestsResult {
            categories,
            tests,
            skip_tests,
            from_cache: true,
        })
    }

    /// The version list, falling back to the cache when offline.
    pub async fn versions(&self) -> Result<VersionsResult> {
        match self
            .request_ok(Method::GET, "/api/versions", &[], None)
            .await
        {
            Ok(value) => {
                let versions: Vec<ClientVersion> =
                    serde_json::from_value(value["versions"].clone())
                        .map_err(|e| Error::parse(format!("bad versions: {e}")))?;
                self.mark_online(true);
                {
                    let mut cache = self.cache();
                    let raw: Vec<Value> = versions
                        .iter()
                        .filter_map(|v| serde_json::to_value(v).ok())
                        .collect();
                    cache.set_versions(raw);
                    cache.save()?;
                }
                Ok(VersionsResult {
                    versions,
                    from_cache: false,
                })
            }
            Err(e) if e.is_offline() => {
                self.mark_online(false);
                let cache = self.cache();
                let versions: Vec<ClientVersion> = cache
                    .versions()
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect();
                if versions.is_empty() {
                    return Err(e);
                }
                log::info!("serving {} version(s) from offline cache", versions.len());
                Ok(VersionsResult {
                    versions,
                    from_cache: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Who the configured key belongs to, plus the commit mirror.
    pub async fn user_info(&self) -> Result<UserInfo> {
        let value = self.request_ok(Method::GET, "/api/user", &[], None).await?;
        let revisions: BTreeMap<String, Value> =
            serde_json::from_value(value["revisions"].clone()).unwrap_or_default();
        Ok(UserInfo {
            username: value["user"]["username"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            role: value["user"]["role"].as_str().unwrap_or_default().to_string(),
            revisions,
        })
    }

    /// Verify connectivity and credentials in one call.
    pub async fn test_connection(&self) -> Result<UserInfo> {
        let info = self.user_info().await?;
        self.mark_online(true);
        Ok(info)
    }

    /// Log metadata for one report.
    pub async fn report_logs(&self, report_id: i64) -> Result<Vec<Value>> {
        let query = [("report_id", report_id.to_string())];
        let value = self
            .request_ok(Method::GET, "/api/logs", &query, None)
            .await?;
        Ok(value["logs"].as_array().cloned().unwrap_or_default())
    }

    /// Download one log, inflated back to its original bytes.
    pub async fn download_log(&self, log_id: i64) -> Result<Vec<u8>> {
        use base64::Engine as _;
        use std::io::Read as _;

        let query = [("log_id", log_id.to_string())];
        let value = self
            .request_ok(Method::GET, "/api/logs", &query, None)
            .await?;
        let encoded = value["log"]["data"]
            .as_str()
            .ok_or_else(|| Error::parse("log download missing data"))?;
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::parse(format!("bad base64 in log: {e}")))?;
        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::parse(format!("bad zlib stream in log: {e}")))?;
        Ok(out)
    }

    /// Delete one log (admin keys only).
    pub async fn delete_log(&self, log_id: i64) -> Result<()> {
        let body = json!({"action": "delete", "log_id": log_id});
        self.request_ok(Method::POST, "/api/logs", &[], Some(&body))
            .await?;
        Ok(())
    }

    /// The caller's notifications.
    pub async fn notifications(
        &self,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let mut query = vec![("limit", limit.to_string())];
        if unread_only {
            query.push(("unread", "true".to_string()));
        }
        let value = self
            .request_ok(Method::GET, "/api/notifications", &query, None)
            .await?;
        serde_json::from_value(value["notifications"].clone())
            .map_err(|e| Error::parse(format!("bad notifications: {e}")))
    }

    /// Mark one notification read.
    pub async fn mark_notification_read(&self, id: i64) -> Result<()> {
        let body = json!({"action": "mark_read", "notification_id": id});
        self.request_ok(Method::POST, "/api/notifications", &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Mark everything read.
    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        let body = json!({"action": "mark_all_read"});
        self.request_ok(Method::POST, "/api/notifications", &[], Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client(dir: &Path) -> PanelClient {
        let config = ClientConfig {
            // Nothing listens here; connections fail immediately.
            api_url: "http://127.0.0.1:1".to_string(),
            api_key: "sk_0123456789abcdef0123456789abcdef01234567".to_string(),
            check_interval: 600,
            auto_check_retests: true,
            timeout: 2,
        };
        PanelClient::with_cache_path(config, dir.join("cache.json")).expect("client")
    }

    #[tokio::test]
    async fn test_offline_submission_is_queued() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = offline_client(dir.path());

        let data = json!({
            "meta": {"tester": "ada", "commit": "abc1234", "WAN": true, "LAN": false},
            "results": {"v1": {"1": {"status": "Working", "notes": ""}}},
        });
        let response = client.submit_data(data, true).await.expect("queued");
        let SubmitResponse::Queued { submission_id } = response else {
            panic!("expected the submission to be queued");
        };
        assert_eq!(client.pending_submissions().len(), 1);
        assert_eq!(client.pending_submissions()[0].id, submission_id);

        // Replaying against a dead panel keeps the item queued.
        let submitted = client.process_pending().await.expect("process");
        assert_eq!(submitted, 0);
        assert_eq!(client.pending_submissions().len(), 1);
        assert_eq!(client.pending_submissions()[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_offline_submission_without_queueing_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = offline_client(dir.path());
        let data = json!({"meta": {}, "results": {}});
        let err = client.submit_data(data, false).await.expect_err("offline");
        assert!(err.is_offline());
    }

    #[tokio::test]
    async fn test_catalog_reads_fall_back_to_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = offline_client(dir.path());

        // Seed the cache as a previous online run would have.
        {
            let mut cache = client.cache();
            cache.set_versions(vec![json!({"id": "secondblob.bin.2004-01-15"})]);
            cache.set_tests(
                vec![json!({
                    "test_key": "1",
                    "name": "Login",
                    "description": "Log in",
                    "category_id": null,
                    "category_name": "Setup & Login",
                    "sort_order": 0,
                    "is_enabled": true,
                })],
                Vec::new(),
            );
            cache.save().expect("save");
        }

        let versions = client.versions().await.expect("cached versions");
        assert!(versions.from_cache);
        assert_eq!(versions.versions[0].id, "secondblob.bin.2004-01-15");

        let tests = client.tests(true, None).await.expect("cached tests");
        assert!(tests.from_cache);
        assert_eq!(tests.tests[0].test_key, "1");
    }

    #[tokio::test]
    async fn test_empty_cache_surfaces_the_transport_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = offline_client(dir.path());
        let err = client.versions().await.expect_err("no cache");
        assert!(err.is_offline());
    }
}
