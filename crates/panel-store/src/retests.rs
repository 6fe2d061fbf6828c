//! The retest queue and regression flags.
//!
//! Admins push two kinds of queue items at testers: plain retest requests
//! ("please re-verify this result") and fix confirmations ("a fix landed for
//! something you reported broken"). The tool's daemon polls the unseen items
//! for its tester, surfaces them, and acknowledges the batch.
//!
//! Regression flags are raised automatically by report updates and sit in an
//! admin review queue.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use panel_core::notification::NotificationKind;
use panel_core::retest::{RetestItem, RetestKind};

use crate::error::{Error, Result};
use crate::store::{Store, now};

/// A new queue item as an admin files it.
#[derive(Debug, Clone)]
pub struct RetestRequest {
    /// Retest or fix confirmation.
    pub kind: RetestKind,
    /// Tester the item is addressed to.
    pub tester: String,
    /// Test to rerun.
    pub test_key: String,
    /// Version to rerun it against.
    pub client_version: String,
    /// Why.
    pub reason: String,
    /// Require the latest emulator revision.
    pub latest_revision: bool,
    /// Fix commit for `fixed` items.
    pub commit_hash: Option<String>,
    /// Extra instructions.
    pub notes: Option<String>,
    /// Report the request refers to.
    pub report_id: Option<i64>,
    /// Filing admin.
    pub created_by: Option<String>,
}

/// One auto-raised regression awaiting admin review.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionFlag {
    /// Database id.
    pub id: i64,
    /// Report that regressed.
    pub report_id: i64,
    /// Revision that introduced the regression.
    pub revision: i64,
    /// Test that regressed.
    pub test_key: String,
    /// Status before.
    pub from_status: String,
    /// Status after.
    pub to_status: String,
    /// When the flag was raised.
    pub created_at: String,
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<RetestItem> {
    let kind: String = row.get("kind")?;
    let created: String = row.get("created_at")?;
    Ok(RetestItem {
        id: row.get("id")?,
        kind: RetestKind::parse(&kind).unwrap_or(RetestKind::Retest),
        test_key: row.get("test_key")?,
        test_name: row
            .get::<_, Option<String>>("test_name")?
            .unwrap_or_default(),
        client_version: row.get("client_version")?,
        reason: row.get("reason")?,
        latest_revision: row.get("latest_revision")?,
        commit_hash: row.get("commit_hash")?,
        notes: row.get("notes")?,
        report_id: row.get("report_id")?,
        report_revision: row.get("report_revision")?,
        tested_commit_hash: row.get("tested_commit_hash")?,
        created_at: parse_time(&created),
    })
}

const ITEM_COLUMNS: &str = "q.id, q.kind, q.test_key, t.name AS test_name, q.client_version,
     q.reason, q.latest_revision, q.commit_hash, q.notes, q.report_id,
     q.report_revision, q.tested_commit_hash, q.created_at";

impl Store {
    /// File a queue item and notify the addressed tester.
    pub fn request_retest(&self, request: &RetestRequest) -> Result<i64> {
        if self.test_by_key(&request.test_key)?.is_none() {
            return Err(Error::not_found("test", request.test_key.clone()));
        }

        // Pin the report revision the request was filed against.
        let report_state: Option<(i64, Option<String>)> = match request.report_id {
            Some(report_id) => {
                let report = self.report_by_id(report_id)?;
                Some((report.revision, report.commit_hash))
            }
            None => None,
        };

        let conn = self.conn();
        conn.execute(
            "INSERT INTO retest_queue
               (kind, tester, test_key, client_version, reason, latest_revision,
                commit_hash, notes, report_id, report_revision, tested_commit_hash,
                created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                request.kind.as_str(),
                request.tester,
                request.test_key,
                request.client_version,
                request.reason,
                request.latest_revision,
                request.commit_hash,
                request.notes,
                request.report_id,
                report_state.as_ref().map(|(rev, _)| *rev),
                report_state.as_ref().and_then(|(_, c)| c.clone()),
                now(),
                request.created_by
            ],
        )?;
        let item_id = conn.last_insert_rowid();
        drop(conn);

        if let Some(user) = self.user_by_name(&request.tester)? {
            let (kind, title) = match request.kind {
                RetestKind::Retest => (NotificationKind::Retest, "Retest requested"),
                RetestKind::Fixed => (NotificationKind::Fixed, "Fix ready to verify"),
            };
            self.push_notification(
                user.id,
                kind,
                title,
                &request.reason,
                request.report_id,
                Some(&request.test_key),
                Some(&request.client_version),
                request.notes.as_deref(),
            )?;
        }

        Ok(item_id)
    }

    /// Open queue items for a tester, oldest first.
    pub fn pending_retests(&self, tester: &str) -> Result<Vec<RetestItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM retest_queue q
             LEFT JOIN tests t ON t.test_key = q.test_key
             WHERE q.tester = ?1 AND q.completed_at IS NULL
             ORDER BY q.created_at, q.id"
        ))?;
        let rows = stmt
            .query_map(params![tester], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark a queue item done, optionally recording the outcome status.
    pub fn complete_retest(
        &self,
        id: i64,
        tester: &str,
        new_status: Option<&str>,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE retest_queue SET completed_at = ?1, new_status = ?2
             WHERE id = ?3 AND tester = ?4 AND completed_at IS NULL",
            params![now(), new_status, id, tester],
        )?;
        if changed == 0 {
            return Err(Error::not_found("retest", id.to_string()));
        }
        Ok(())
    }

    /// Queue items the tester's daemon has not acknowledged yet.
    ///
    /// This backs the poll endpoint: items stay in the answer until the
    /// tool acks them, completed or not.
    pub fn unacknowledged_retests(&self, tester: &str) -> Result<Vec<RetestItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM retest_queue q
             LEFT JOIN tests t ON t.test_key = q.test_key
             WHERE q.tester = ?1 AND q.acknowledged_at IS NULL
             ORDER BY q.created_at, q.id"
        ))?;
        let rows = stmt
            .query_map(params![tester], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Acknowledge a batch of queue items for a tester.
    pub fn acknowledge_retests(&self, tester: &str, ids: &[i64]) -> Result<usize> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let timestamp = now();
        let mut acked = 0;
        for id in ids {
            acked += tx.execute(
                "UPDATE retest_queue SET acknowledged_at = ?1
                 WHERE id = ?2 AND tester = ?3 AND acknowledged_at IS NULL",
                params![timestamp, id, tester],
            )?;
        }
        tx.commit()?;
        Ok(acked)
    }

    /// Regressions still awaiting admin review, newest first.
    pub fn unreviewed_regressions(&self) -> Result<Vec<RegressionFlag>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, report_id, revision, test_key, from_status, to_status, created_at
             FROM regression_flags WHERE reviewed_at IS NULL
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RegressionFlag {
                    id: row.get(0)?,
                    report_id: row.get(1)?,
                    revision: row.get(2)?,
                    test_key: row.get(3)?,
                    from_status: row.get(4)?,
                    to_status: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark a regression flag reviewed.
    pub fn review_regression(&self, id: i64, reviewer: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE regression_flags SET reviewed_at = ?1, reviewed_by = ?2
             WHERE id = ?3 AND reviewed_at IS NULL",
            params![now(), reviewer, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("regression flag", id.to_string()));
        }
        Ok(())
    }
}
