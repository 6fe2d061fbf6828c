//! Panel-wide search.
//!
//! Plain LIKE matching over the battery, versions, and report payloads.
//! The data set is small enough that an index-backed search engine would be
//! overkill; results are grouped by kind for the search page.

use rusqlite::params;
use serde::Serialize;

use panel_core::taxonomy::TestDefinition;
use panel_core::version::ClientVersion;

use crate::error::Result;
use crate::reports::Report;
use crate::store::Store;

/// Grouped search results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Battery entries whose key, name, or description matched.
    pub tests: Vec<TestDefinition>,
    /// Versions whose id or display name matched.
    pub versions: Vec<ClientVersion>,
    /// Reports whose tester, version, or result notes matched.
    pub reports: Vec<Report>,
}

impl SearchResults {
    /// Total hit count across all groups.
    pub fn total(&self) -> usize {
        self.tests.len() + self.versions.len() + self.reports.len()
    }
}

fn like_pattern(query: &str) -> String {
    // Escape LIKE metacharacters so a literal "%" in the query matches
    // itself.
    let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

impl Store {
    /// Search everything for `query`, capping each group at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }
        let pattern = like_pattern(query);

        let tests = self
            .list_tests(true)?
            .into_iter()
            .filter(|t| {
                let q = query.to_lowercase();
                t.test_key.to_lowercase().contains(&q)
                    || t.name.to_lowercase().contains(&q)
                    || t.description.to_lowercase().contains(&q)
            })
            .take(limit)
            .collect();

        let versions = self
            .list_versions(true)?
            .into_iter()
            .filter(|v| {
                let q = query.to_lowercase();
                v.id.to_lowercase().contains(&q)
                    || v.display_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&q))
            })
            .take(limit)
            .collect();

        let report_ids: Vec<i64> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT id FROM reports
                 WHERE tester LIKE ?1 ESCAPE '\\'
                    OR client_version LIKE ?1 ESCAPE '\\'
                    OR results LIKE ?1 ESCAPE '\\'
                 ORDER BY updated_at DESC LIMIT ?2",
            )?;
            stmt.query_map(params![pattern, limit as i64], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut reports = Vec::with_capacity(report_ids.len());
        for id in report_ids {
            reports.push(self.report_by_id(id)?);
        }

        Ok(SearchResults {
            tests,
            versions,
            reports,
        })
    }

}
