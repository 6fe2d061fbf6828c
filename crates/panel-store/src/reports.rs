//! Report submission, hashing precheck, and the revision archive.
//!
//! A report is unique per (tester, client version, test type). Resubmitting
//! with identical content is a no-op; resubmitting with different content
//! archives the live payload as a numbered revision, stores the diff next to
//! the snapshot, and flags any regressions for admin review.

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use panel_core::diff::{ReportDiff, StatusChange, compute_diff};
use panel_core::report::{SessionSubmission, parse_results};
use panel_core::{TestStatus, content_hash};

use crate::error::{Error, Result};
use crate::store::{Store, now};

/// What the store did with one version's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitAction {
    /// First report for this (tester, version, test type).
    Created,
    /// Existing report replaced; previous payload archived.
    Updated,
    /// Content hash matched the live payload; nothing stored.
    Skipped,
}

impl SubmitAction {
    /// Wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitAction::Created => "created",
            SubmitAction::Updated => "updated",
            SubmitAction::Skipped => "skipped",
        }
    }
}

/// Per-version outcome of a submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// Report id (existing id for updates and skips).
    pub report_id: i64,
    /// Version the results were recorded against.
    pub client_version: String,
    /// What happened.
    pub action: SubmitAction,
    /// Live revision number after the submission.
    pub revision: i64,
    /// Results with a non-empty status.
    pub tests_recorded: usize,
    /// Logs stored alongside the report.
    pub logs_attached: usize,
    /// Regressions introduced by this submission.
    pub regressions: Vec<StatusChange>,
}

/// Answer to a hash precheck for one version.
#[derive(Debug, Clone, Serialize)]
pub struct HashCheck {
    /// Version the hash was checked against.
    pub client_version: String,
    /// A report exists for this (tester, version, test type).
    pub exists: bool,
    /// The client's hash matches the live payload.
    pub hash_matches: bool,
    /// Live payload hash, when a report exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_hash: Option<String>,
    /// Existing report id, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    /// Archived revisions of the existing report.
    pub revision_count: i64,
    /// What a submission would do: "create", "update", or "skip".
    pub action: &'static str,
}

/// A live report row.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Database id.
    pub id: i64,
    /// Submitting tester.
    pub tester: String,
    /// Version tested.
    pub client_version: String,
    /// "WAN", "LAN", or "WAN/LAN".
    pub test_type: String,
    /// Emulator commit the session ran against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Canonical hash of the live payload.
    pub content_hash: String,
    /// Raw per-test results as submitted.
    pub results: Value,
    /// Live revision number (0 for a never-updated report).
    pub revision: i64,
    /// First submission time.
    pub created_at: String,
    /// Last update time.
    pub updated_at: String,
}

/// An archived revision snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRevision {
    /// Owning report.
    pub report_id: i64,
    /// Revision number of the snapshot.
    pub revision: i64,
    /// Commit the archived payload was tested against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Hash of the archived payload.
    pub content_hash: String,
    /// The archived results.
    pub results: Value,
    /// Diff from this snapshot to its successor.
    pub diff: ReportDiff,
    /// When the snapshot was taken.
    pub archived_at: String,
}

/// Filters for listing reports. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Only this tester's reports.
    pub tester: Option<String>,
    /// Only reports against this version.
    pub client_version: Option<String>,
    /// Only this test type.
    pub test_type: Option<String>,
    /// Cap the result count.
    pub limit: Option<usize>,
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let results: String = row.get("results")?;
    Ok(Report {
        id: row.get("id")?,
        tester: row.get("tester")?,
        client_version: row.get("client_version")?,
        test_type: row.get("test_type")?,
        commit_hash: row.get("commit_hash")?,
        content_hash: row.get("content_hash")?,
        results: serde_json::from_str(&results).unwrap_or(Value::Null),
        revision: row.get("revision")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const REPORT_COLUMNS: &str = "id, tester, client_version, test_type, commit_hash,
     content_hash, results, revision, created_at, updated_at";

fn count_recorded(raw: &Value) -> usize {
    match parse_results(raw) {
        Ok(results) => results
            .values()
            .filter(|r| {
                TestStatus::parse(&r.status)
                    .map(|s| s.is_tested())
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}

impl Store {
    /// Record a full session submission for `tester`.
    ///
    /// Each version in the payload is handled independently; a bad version
    /// fails the whole call before anything is written for it, but versions
    /// already processed stay recorded.
    pub fn submit_session(
        &self,
        tester: &str,
        submission: &SessionSubmission,
    ) -> Result<Vec<SubmitOutcome>> {
        submission.validate()?;
        let test_type = submission.meta.test_type();
        let commit = match submission.meta.commit.trim() {
            "" => None,
            c => Some(c),
        };

        let mut outcomes = Vec::with_capacity(submission.results.len());
        for (version_id, raw) in &submission.results {
            let logs = submission.attached_logs.get(version_id);
            let outcome = self.submit_version(tester, version_id, test_type, commit, raw, logs)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn submit_version(
        &self,
        tester: &str,
        version_id: &str,
        test_type: &str,
        commit: Option<&str>,
        raw: &Value,
        logs: Option<&Vec<Value>>,
    ) -> Result<SubmitOutcome> {
        // Validate every status before touching the database.
        let new_results = parse_results(raw)?;
        for result in new_results.values() {
            result.status()?;
        }

        if self.version_by_id(version_id)?.is_none() {
            return Err(Error::not_found("version", version_id));
        }

        let logs_value = logs.map(|l| Value::Array(l.clone()));
        let hash = content_hash(raw, logs_value.as_ref());
        let tests_recorded = count_recorded(raw);
        let timestamp = now();

        // Verify logs before anything is written: a bad attachment must not
        // leave a committed report whose hash covers logs that never landed.
        let verified_logs = match logs {
            Some(raw_logs) => crate::logs::verify_logs(raw_logs)?,
            None => Vec::new(),
        };

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let existing: Option<(i64, String, String, i64, Option<String>)> = tx
            .query_row(
                "SELECT id, content_hash, results, revision, commit_hash FROM reports
                 WHERE tester = ?1 AND client_version = ?2 AND test_type = ?3",
                params![tester, version_id, test_type],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO reports
                       (tester, client_version, test_type, commit_hash, content_hash,
                        results, revision, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
                    params![
                        tester,
                        version_id,
                        test_type,
                        commit,
                        hash,
                        serde_json::to_string(raw)?,
                        timestamp
                    ],
                )?;
                let report_id = tx.last_insert_rowid();
                let logs_attached =
                    crate::logs::insert_logs(&tx, report_id, &verified_logs, &timestamp)?;
                SubmitOutcome {
                    report_id,
                    client_version: version_id.to_string(),
                    action: SubmitAction::Created,
                    revision: 0,
                    tests_recorded,
                    logs_attached,
                    regressions: Vec::new(),
                }
            }
            Some((report_id, old_hash, _, revision, _)) if old_hash == hash => SubmitOutcome {
                report_id,
                client_version: version_id.to_string(),
                action: SubmitAction::Skipped,
                revision,
                tests_recorded,
                logs_attached: 0,
                regressions: Vec::new(),
            },
            Some((report_id, old_hash, old_raw, revision, old_commit)) => {
                let old_value: Value = serde_json::from_str(&old_raw)?;
                let old_results = parse_results(&old_value).unwrap_or_default();
                let diff = compute_diff(&old_results, &new_results);
                let next_revision = revision + 1;

                tx.execute(
                    "INSERT INTO report_revisions
                       (report_id, revision, commit_hash, content_hash, results, diff, archived_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        report_id,
                        revision,
                        old_commit,
                        old_hash,
                        old_raw,
                        serde_json::to_string(&diff)?,
                        timestamp
                    ],
                )?;
                tx.execute(
                    "UPDATE reports SET commit_hash = ?1, content_hash = ?2, results = ?3,
                        revision = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        commit,
                        hash,
                        serde_json::to_string(raw)?,
                        next_revision,
                        timestamp,
                        report_id
                    ],
                )?;

                // The stored logs belong to the payload the hash covers;
                // replace the previous revision's set wholesale.
                tx.execute(
                    "DELETE FROM report_logs WHERE report_id = ?1",
                    params![report_id],
                )?;
                let logs_attached =
                    crate::logs::insert_logs(&tx, report_id, &verified_logs, &timestamp)?;

                let regressions: Vec<StatusChange> =
                    diff.regressed_tests().into_iter().cloned().collect();
                for change in &regressions {
                    tx.execute(
                        "INSERT INTO regression_flags
                           (report_id, revision, test_key, from_status, to_status, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            report_id,
                            next_revision,
                            change.test_key,
                            change.from,
                            change.to,
                            timestamp
                        ],
                    )?;
                }
                if !regressions.is_empty() {
                    log::warn!(
                        "report {report_id} rev {next_revision}: {} regression(s) flagged",
                        regressions.len()
                    );
                }

                SubmitOutcome {
                    report_id,
                    client_version: version_id.to_string(),
                    action: SubmitAction::Updated,
                    revision: next_revision,
                    tests_recorded,
                    logs_attached,
                    regressions,
                }
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Answer hash prechecks for several versions at once.
    ///
    /// `hashes` pairs each version id with the client's locally computed
    /// content hash.
    pub fn check_hashes(
        &self,
        tester: &str,
        test_type: &str,
        hashes: &[(String, String)],
    ) -> Result<Vec<HashCheck>> {
        let conn = self.conn();
        let mut out = Vec::with_capacity(hashes.len());
        for (version_id, client_hash) in hashes {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT id, content_hash FROM reports
                     WHERE tester = ?1 AND client_version = ?2 AND test_type = ?3",
                    params![tester, version_id, test_type],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let check = match row {
                None => HashCheck {
                    client_version: version_id.clone(),
                    exists: false,
                    hash_matches: false,
                    server_hash: None,
                    report_id: None,
                    revision_count: 0,
                    action: "create",
                },
                Some((report_id, server_hash)) => {
                    let revisions: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM report_revisions WHERE report_id = ?1",
                        params![report_id],
                        |r| r.get(0),
                    )?;
                    let matches = &server_hash == client_hash;
                    HashCheck {
                        client_version: version_id.clone(),
                        exists: true,
                        hash_matches: matches,
                        server_hash: Some(server_hash),
                        report_id: Some(report_id),
                        revision_count: revisions,
                        action: if matches { "skip" } else { "update" },
                    }
                }
            };
            out.push(check);
        }
        Ok(out)
    }

    /// One report by id.
    pub fn report_by_id(&self, id: i64) -> Result<Report> {
        self.conn()
            .query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
                params![id],
                row_to_report,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("report", id.to_string()))
    }

    /// Reports matching `filter`, newest first.
    pub fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE 1=1");
        let mut args: Vec<String> = Vec::new();
        if let Some(tester) = &filter.tester {
            args.push(tester.clone());
            sql.push_str(&format!(" AND tester = ?{}", args.len()));
        }
        if let Some(version) = &filter.client_version {
            args.push(version.clone());
            sql.push_str(&format!(" AND client_version = ?{}", args.len()));
        }
        if let Some(test_type) = &filter.test_type {
            args.push(test_type.clone());
            sql.push_str(&format!(" AND test_type = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY updated_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), row_to_report)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Archived revisions of a report, oldest first.
    pub fn report_revisions(&self, report_id: i64) -> Result<Vec<ReportRevision>> {
        // Existence check keeps "no revisions" distinct from "no report".
        self.report_by_id(report_id)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT report_id, revision, commit_hash, content_hash, results, diff, archived_at
             FROM report_revisions WHERE report_id = ?1 ORDER BY revision",
        )?;
        let rows = stmt
            .query_map(params![report_id], |row| {
                let results: String = row.get("results")?;
                let diff: String = row.get("diff")?;
                Ok((
                    row.get::<_, i64>("report_id")?,
                    row.get::<_, i64>("revision")?,
                    row.get::<_, Option<String>>("commit_hash")?,
                    row.get::<_, String>("content_hash")?,
                    results,
                    diff,
                    row.get::<_, String>("archived_at")?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut revisions = Vec::with_capacity(rows.len());
        for (report_id, revision, commit_hash, hash, results, diff, archived_at) in rows {
            revisions.push(ReportRevision {
                report_id,
                revision,
                commit_hash,
                content_hash: hash,
                results: serde_json::from_str(&results)?,
                diff: serde_json::from_str(&diff)?,
                archived_at,
            });
        }
        Ok(revisions)
    }

    /// Delete a report and everything hanging off it.
    pub fn delete_report(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM reports WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::not_found("report", id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_core::report::SubmissionMeta;
    use panel_core::version::ClientVersion;
    use serde_json::json;
    use std::collections::BTreeMap;

    const VERSION: &str = "secondblob.bin.2004-01-15";

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store
            .upsert_version(&ClientVersion {
                id: VERSION.to_string(),
                display_name: None,
                packages: Vec::new(),
                steam_date: None,
                steam_time: None,
                skip_tests: Vec::new(),
                sort_order: 0,
                is_enabled: true,
            })
            .expect("version");
        store
    }

    fn submission(commit: &str, results: Value) -> SessionSubmission {
        SessionSubmission {
            meta: SubmissionMeta {
                tester: "alice".to_string(),
                commit: commit.to_string(),
                wan: true,
                lan: false,
                emulator_path: None,
            },
            results: BTreeMap::from([(VERSION.to_string(), results)]),
            attached_logs: BTreeMap::new(),
            version_packages: None,
        }
    }

    #[test]
    fn test_first_submission_creates_revision_zero() {
        let store = store();
        let outcomes = store
            .submit_session(
                "alice",
                &submission("abc1234", json!({"1": {"status": "Working", "notes": ""}})),
            )
            .expect("submit");
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].action, SubmitAction::Created);
        assert_eq!(outcomes[0].revision, 0);
        assert_eq!(outcomes[0].tests_recorded, 1);

        let report = store.report_by_id(outcomes[0].report_id).expect("report");
        assert_eq!(report.tester, "alice");
        assert_eq!(report.test_type, "WAN");
        assert_eq!(report.commit_hash.as_deref(), Some("abc1234"));
    }

    #[test]
    fn test_identical_resubmission_is_skipped() {
        let store = store();
        let payload = json!({"1": {"status": "Working", "notes": ""}});
        store
            .submit_session("alice", &submission("abc1234", payload.clone()))
            .expect("first");
        let outcomes = store
            .submit_session("alice", &submission("abc1234", payload))
            .expect("second");
        assert_eq!(outcomes[0].action, SubmitAction::Skipped);
        assert!(store.report_revisions(outcomes[0].report_id).expect("revs").is_empty());
    }

    #[test]
    fn test_update_archives_previous_payload() {
        let store = store();
        let first = store
            .submit_session(
                "alice",
                &submission("abc1234", json!({"1": {"status": "Working", "notes": "ok"}})),
            )
            .expect("first");
        let second = store
            .submit_session(
                "alice",
                &submission(
                    "def5678",
                    json!({"1": {"status": "Working", "notes": "still ok"}}),
                ),
            )
            .expect("second");
        assert_eq!(second[0].action, SubmitAction::Updated);
        assert_eq!(second[0].revision, 1);

        let revisions = store.report_revisions(first[0].report_id).expect("revs");
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].revision, 0);
        assert_eq!(revisions[0].commit_hash.as_deref(), Some("abc1234"));
        assert_eq!(revisions[0].results["1"]["notes"], "ok");
        assert_eq!(revisions[0].diff.notes_changed, vec!["1"]);

        let live = store.report_by_id(first[0].report_id).expect("report");
        assert_eq!(live.revision, 1);
        assert_eq!(live.commit_hash.as_deref(), Some("def5678"));
    }

    #[test]
    fn test_regression_is_flagged_on_update() {
        let store = store();
        store
            .submit_session(
                "alice",
                &submission("abc1234", json!({"3": {"status": "Working", "notes": ""}})),
            )
            .expect("first");
        let outcomes = store
            .submit_session(
                "alice",
                &submission(
                    "def5678",
                    json!({"3": {"status": "Not working", "notes": "login hangs"}}),
                ),
            )
            .expect("second");
        assert_eq!(outcomes[0].regressions.len(), 1);
        assert_eq!(outcomes[0].regressions[0].test_key, "3");

        let flags = store.unreviewed_regressions().expect("flags");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].from_status, "Working");
        assert_eq!(flags[0].to_status, "Not working");
    }

    #[test]
    fn test_wan_and_lan_reports_are_separate() {
        let store = store();
        let payload = json!({"1": {"status": "Working", "notes": ""}});
        store
            .submit_session("alice", &submission("abc", payload.clone()))
            .expect("wan");
        let mut lan = submission("abc", payload);
        lan.meta.wan = false;
        lan.meta.lan = true;
        let outcomes = store.submit_session("alice", &lan).expect("lan");
        assert_eq!(outcomes[0].action, SubmitAction::Created);
        assert_eq!(store.list_reports(&ReportFilter::default()).expect("all").len(), 2);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let store = store();
        let mut sub = submission("abc", json!({"1": {"status": "Working", "notes": ""}}));
        sub.results = BTreeMap::from([(
            "secondblob.bin.1999-01-01".to_string(),
            json!({"1": {"status": "Working", "notes": ""}}),
        )]);
        let err = store.submit_session("alice", &sub).expect_err("unknown");
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_unknown_status_is_rejected_before_write() {
        let store = store();
        let err = store
            .submit_session(
                "alice",
                &submission("abc", json!({"1": {"status": "Kinda works", "notes": ""}})),
            )
            .expect_err("bad status");
        assert!(matches!(err, Error::Core(_)));
        assert!(store.list_reports(&ReportFilter::default()).expect("none").is_empty());
    }

    #[test]
    fn test_check_hashes_reports_planned_action() {
        let store = store();
        let payload = json!({"1": {"status": "Working", "notes": ""}});
        store
            .submit_session("alice", &submission("abc", payload.clone()))
            .expect("submit");
        let live_hash = content_hash(&payload, None);

        let checks = store
            .check_hashes(
                "alice",
                "WAN",
                &[
                    (VERSION.to_string(), live_hash.clone()),
                    (VERSION.to_string(), "deadbeef".to_string()),
                    ("secondblob.bin.1999-01-01".to_string(), live_hash),
                ],
            )
            .expect("check");

        assert_eq!(checks[0].action, "skip");
        assert!(checks[0].hash_matches);
        assert_eq!(checks[1].action, "update");
        assert!(checks[1].exists);
        assert_eq!(checks[2].action, "create");
        assert!(!checks[2].exists);
    }

    #[test]
    fn test_list_reports_filtering() {
        let store = store();
        let payload = json!({"1": {"status": "Working", "notes": ""}});
        store
            .submit_session("alice", &submission("abc", payload.clone()))
            .expect("alice");
        let mut bob = submission("abc", payload);
        bob.meta.tester = "bob".to_string();
        store.submit_session("bob", &bob).expect("bob");

        let filter = ReportFilter {
            tester: Some("bob".to_string()),
            ..Default::default()
        };
        let reports = store.list_reports(&filter).expect("filtered");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].tester, "bob");
    }

    #[test]
    fn test_delete_report_removes_revisions() {
        let store = store();
        let first = store
            .submit_session("alice", &submission("a", json!({"1": {"status": "Working", "notes": ""}})))
            .expect("first");
        store
            .submit_session("alice", &submission("b", json!({"1": {"status": "N/A", "notes": ""}})))
            .expect("second");
        store.delete_report(first[0].report_id).expect("delete");
        assert!(matches!(
            store.report_by_id(first[0].report_id),
            Err(Error::NotFound { .. })
        ));
    }
}
