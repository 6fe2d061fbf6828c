//! Categories and the test battery.

use rusqlite::{OptionalExtension, params};

use panel_core::taxonomy::{TestCategory, TestDefinition};

use crate::error::{Error, Result};
use crate::store::Store;

fn row_to_test(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestDefinition> {
    Ok(TestDefinition {
        test_key: row.get("test_key")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category_id: row.get("category_id")?,
        category_name: row
            .get::<_, Option<String>>("category_name")?
            .unwrap_or_else(|| "Uncategorized".to_string()),
        sort_order: row.get("sort_order")?,
        is_enabled: row.get("is_enabled")?,
    })
}

const TEST_COLUMNS: &str = "t.test_key, t.name, t.description, t.category_id,
     c.name AS category_name, t.sort_order, t.is_enabled";

impl Store {
    /// All categories in battery order.
    pub fn list_categories(&self) -> Result<Vec<TestCategory>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, sort_order FROM categories ORDER BY sort_order, name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TestCategory {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    sort_order: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Create a category, returning its id.
    pub fn create_category(&self, name: &str, sort_order: i64) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO categories (name, sort_order) VALUES (?1, ?2)",
            params![name, sort_order],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Conflict(format!("category '{name}' already exists"))
            }
            other => Error::Sqlite(other),
        })?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete a category; its tests become uncategorized.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::not_found("category", id.to_string()));
        }
        Ok(())
    }

    /// The battery, category-joined, in battery order.
    pub fn list_tests(&self, include_disabled: bool) -> Result<Vec<TestDefinition>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {TEST_COLUMNS} FROM tests t
             LEFT JOIN categories c ON c.id = t.category_id
             {} ORDER BY t.sort_order, t.test_key",
            if include_disabled { "" } else { "WHERE t.is_enabled = 1" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_test)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One test by key.
    pub fn test_by_key(&self, test_key: &str) -> Result<Option<TestDefinition>> {
        Ok(self
            .conn()
            .query_row(
                &format!(
                    "SELECT {TEST_COLUMNS} FROM tests t
                     LEFT JOIN categories c ON c.id = t.category_id
                     WHERE t.test_key = ?1"
                ),
                params![test_key],
                row_to_test,
            )
            .optional()?)
    }

    /// The battery for one client version.
    ///
    /// If the version has an explicit test selection it wins; otherwise the
    /// enabled battery minus the version's `skip_tests` list applies.
    pub fn tests_for_version(&self, version_id: &str) -> Result<Vec<TestDefinition>> {
        let version = self
            .version_by_id(version_id)?
            .ok_or_else(|| Error::not_found("version", version_id))?;

        let conn = self.conn();
        let explicit: i64 = conn.query_row(
            "SELECT COUNT(*) FROM version_tests WHERE version_id = ?1",
            params![version_id],
            |row| row.get(0),
        )?;

        if explicit > 0 {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEST_COLUMNS} FROM tests t
                 LEFT JOIN categories c ON c.id = t.category_id
                 JOIN version_tests vt ON vt.test_key = t.test_key
                 WHERE vt.version_id = ?1 AND t.is_enabled = 1
                 ORDER BY t.sort_order, t.test_key"
            ))?;
            let rows = stmt
                .query_map(params![version_id], row_to_test)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            return Ok(rows);
        }
        drop(conn);

        let mut tests = self.list_tests(false)?;
        tests.retain(|t| !version.skip_tests.contains(&t.test_key));
        Ok(tests)
    }

    /// Pin a version to an explicit subset of the battery; an empty slice
    /// clears the pin and the version falls back to skip-list semantics.
    pub fn set_version_tests(&self, version_id: &str, test_keys: &[String]) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM version_tests WHERE version_id = ?1",
            params![version_id],
        )?;
        for key in test_keys {
            tx.execute(
                "INSERT OR IGNORE INTO version_tests (version_id, test_key) VALUES (?1, ?2)",
                params![version_id, key],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Create or update a battery entry.
    pub fn upsert_test(&self, def: &TestDefinition) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tests (test_key, name, description, category_id, sort_order, is_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (test_key) DO UPDATE SET
               name = excluded.name,
               description = excluded.description,
               category_id = excluded.category_id,
               sort_order = excluded.sort_order,
               is_enabled = excluded.is_enabled",
            params![
                def.test_key,
                def.name,
                def.description,
                def.category_id,
                def.sort_order,
                def.is_enabled
            ],
        )?;
        Ok(())
    }

    /// Hide or restore a test without losing reports against it.
    pub fn set_test_enabled(&self, test_key: &str, enabled: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE tests SET is_enabled = ?1 WHERE test_key = ?2",
            params![enabled, test_key],
        )?;
        if changed == 0 {
            return Err(Error::not_found("test", test_key));
        }
        Ok(())
    }
}
