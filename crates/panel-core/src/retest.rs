//! Retest queue items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a test is back in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetestKind {
    /// An admin wants the result re-verified.
    Retest,
    /// A fix landed; the tester should confirm it.
    Fixed,
}

impl RetestKind {
    /// Wire string ("retest" / "fixed").
    pub fn as_str(&self) -> &'static str {
        match self {
            RetestKind::Retest => "retest",
            RetestKind::Fixed => "fixed",
        }
    }

    /// Parse the wire string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "retest" => Some(RetestKind::Retest),
            "fixed" => Some(RetestKind::Fixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pending item in a tester's retest queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetestItem {
    /// Queue item id.
    pub id: i64,
    /// Item kind.
    #[serde(rename = "type")]
    pub kind: RetestKind,
    /// Test to rerun.
    pub test_key: String,
    /// Denormalized test name for display.
    pub test_name: String,
    /// Version the test should be rerun against.
    pub client_version: String,
    /// Why the retest was requested.
    pub reason: String,
    /// Whether the tester must use the latest emulator revision.
    pub latest_revision: bool,
    /// Fix commit, for `fixed` items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Admin notes explaining what to look at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Report the request refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    /// Report revision at request time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_revision: Option<i64>,
    /// Commit the original result was submitted against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_commit_hash: Option<String>,
    /// When the item was queued.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(RetestKind::parse("retest"), Some(RetestKind::Retest));
        assert_eq!(RetestKind::parse("fixed"), Some(RetestKind::Fixed));
        assert_eq!(RetestKind::parse("other"), None);
        assert_eq!(RetestKind::Retest.as_str(), "retest");
    }

    #[test]
    fn test_item_serializes_kind_as_type() {
        let item = RetestItem {
            id: 7,
            kind: RetestKind::Fixed,
            test_key: "12".to_string(),
            test_name: "Server Browser".to_string(),
            client_version: "secondblob.bin.2004-01-15".to_string(),
            reason: "fix landed".to_string(),
            latest_revision: true,
            commit_hash: Some("abc1234".to_string()),
            notes: None,
            report_id: Some(3),
            report_revision: Some(2),
            tested_commit_hash: None,
            created_at: Utc::now(),
        };
        let v = serde_json::to_value(&item).expect("serializes");
        assert_eq!(v["type"], "fixed");
        assert_eq!(v["report_id"], 3);
        assert!(v.get("notes").is_none());
    }
}
