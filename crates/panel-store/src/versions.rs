//! Client versions and version notices.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use panel_core::version::{ClientVersion, VersionNotice};

use crate::error::{Error, Result};
use crate::store::{Store, now};

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClientVersion> {
    let packages: String = row.get("packages")?;
    let skip_tests: String = row.get("skip_tests")?;
    Ok(ClientVersion {
        id: row.get("id")?,
        display_name: row.get("display_name")?,
        packages: serde_json::from_str(&packages).unwrap_or_default(),
        steam_date: row.get("steam_date")?,
        steam_time: row.get("steam_time")?,
        skip_tests: serde_json::from_str(&skip_tests).unwrap_or_default(),
        sort_order: row.get("sort_order")?,
        is_enabled: row.get("is_enabled")?,
    })
}

fn row_to_notice(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, VersionNotice)> {
    let created: String = row.get("created_at")?;
    Ok((
        row.get("version_id")?,
        VersionNotice {
            id: row.get("id")?,
            name: row.get("name")?,
            message: row.get("message")?,
            commit_hash: row.get("commit_hash")?,
            created_at: DateTime::parse_from_rfc3339(&created)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_default(),
            created_by: row.get("created_by")?,
        },
    ))
}

impl Store {
    /// Create or update a client version.
    pub fn upsert_version(&self, version: &ClientVersion) -> Result<()> {
        if version.id.trim().is_empty() {
            return Err(panel_core::Error::validation_field("id", "must not be empty").into());
        }
        self.conn().execute(
            "INSERT INTO versions
               (id, display_name, packages, steam_date, steam_time, skip_tests, sort_order, is_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (id) DO UPDATE SET
               display_name = excluded.display_name,
               packages = excluded.packages,
               steam_date = excluded.steam_date,
               steam_time = excluded.steam_time,
               skip_tests = excluded.skip_tests,
               sort_order = excluded.sort_order,
               is_enabled = excluded.is_enabled",
            params![
                version.id,
                version.display_name,
                serde_json::to_string(&version.packages)?,
                version.steam_date,
                version.steam_time,
                serde_json::to_string(&version.skip_tests)?,
                version.sort_order,
                version.is_enabled
            ],
        )?;
        Ok(())
    }

    /// One version by id.
    pub fn version_by_id(&self, id: &str) -> Result<Option<ClientVersion>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, display_name, packages, steam_date, steam_time, skip_tests,
                        sort_order, is_enabled
                 FROM versions WHERE id = ?1",
                params![id],
                row_to_version,
            )
            .optional()?)
    }

    /// All versions in listing order.
    pub fn list_versions(&self, include_disabled: bool) -> Result<Vec<ClientVersion>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT id, display_name, packages, steam_date, steam_time, skip_tests,
                    sort_order, is_enabled
             FROM versions {} ORDER BY sort_order, id",
            if include_disabled { "" } else { "WHERE is_enabled = 1" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_version)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete a version together with its notices and test pins.
    pub fn delete_version(&self, id: &str) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM versions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::not_found("version", id));
        }
        Ok(())
    }

    /// Attach a notice to a version, returning the notice id.
    pub fn add_version_notice(
        &self,
        version_id: &str,
        name: &str,
        message: &str,
        commit_hash: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM versions WHERE id = ?1",
            params![version_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::not_found("version", version_id));
        }
        conn.execute(
            "INSERT INTO version_notices (version_id, name, message, commit_hash, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![version_id, name, message, commit_hash, now(), created_by],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Notices for one version, newest first. With `commit_hash` set only
    /// the notices applying to that commit are returned.
    pub fn version_notices(
        &self,
        version_id: &str,
        commit_hash: Option<&str>,
    ) -> Result<Vec<VersionNotice>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, version_id, name, message, commit_hash, created_at, created_by
             FROM version_notices WHERE version_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let mut notices = stmt
            .query_map(params![version_id], row_to_notice)?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(_, notice)| notice)
            .collect::<Vec<_>>();
        notices.retain(|n| n.applies_to(commit_hash));
        Ok(notices)
    }

    /// Applicable notices for several versions in one call, keyed by
    /// version id. Versions with no applicable notices are omitted.
    pub fn version_notices_batch(
        &self,
        version_ids: &[String],
        commit_hash: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<VersionNotice>>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, version_id, name, message, commit_hash, created_at, created_by
             FROM version_notices ORDER BY created_at DESC, id DESC",
        )?;
        let mut out: BTreeMap<String, Vec<VersionNotice>> = BTreeMap::new();
        for row in stmt.query_map([], row_to_notice)? {
            let (version_id, notice) = row?;
            if version_ids.contains(&version_id) && notice.applies_to(commit_hash) {
                out.entry(version_id).or_default().push(notice);
            }
        }
        Ok(out)
    }

    /// Remove a notice.
    pub fn delete_version_notice(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM version_notices WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::not_found("notice", id.to_string()));
        }
        Ok(())
    }
}
