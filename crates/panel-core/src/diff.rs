//! Revision diffing between report payloads.
//!
//! When a submission updates an existing report, the old payload is archived
//! and a diff against it is stored alongside the snapshot. Regressions are
//! flagged by comparing the ordinal status priority of old and new results.

use serde::{Deserialize, Serialize};

use crate::report::VersionResults;
use crate::status::TestStatus;

/// A status transition for one test between two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Test key ("1" .. "28").
    pub test_key: String,
    /// Previous status wire string.
    pub from: String,
    /// New status wire string.
    pub to: String,
    /// Whether this transition is a regression.
    pub regression: bool,
}

/// Difference between two revisions of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDiff {
    /// Test keys present only in the new revision.
    pub added: Vec<String>,
    /// Test keys present only in the old revision.
    pub removed: Vec<String>,
    /// Status transitions, regressions marked.
    pub status_changes: Vec<StatusChange>,
    /// Test keys whose status is unchanged but whose notes differ.
    pub notes_changed: Vec<String>,
}

impl ReportDiff {
    /// Returns `true` if nothing changed between the revisions.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.status_changes.is_empty()
            && self.notes_changed.is_empty()
    }

    /// Returns `true` if any status transition is a regression.
    pub fn has_regressions(&self) -> bool {
        self.status_changes.iter().any(|c| c.regression)
    }

    /// Test keys that regressed in this diff.
    pub fn regressed_tests(&self) -> Vec<&StatusChange> {
        self.status_changes.iter().filter(|c| c.regression).collect()
    }
}

/// Compute the diff from `old` to `new`.
///
/// Unparseable status strings are treated as untested rather than rejected;
/// the live payload was already validated on submission.
pub fn compute_diff(old: &VersionResults, new: &VersionResults) -> ReportDiff {
    let mut diff = ReportDiff::default();

    for key in new.keys() {
        if !old.contains_key(key) {
            diff.added.push(key.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            diff.removed.push(key.clone());
        }
    }

    for (key, new_result) in new {
        let Some(old_result) = old.get(key) else {
            continue;
        };
        let old_status = TestStatus::parse(&old_result.status).unwrap_or(TestStatus::Untested);
        let new_status = TestStatus::parse(&new_result.status).unwrap_or(TestStatus::Untested);

        if old_status != new_status {
            diff.status_changes.push(StatusChange {
                test_key: key.clone(),
                from: old_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                regression: new_status.is_regression_from(old_status),
            });
        } else if old_result.notes != new_result.notes {
            diff.notes_changed.push(key.clone());
        }
    }

    diff
}
