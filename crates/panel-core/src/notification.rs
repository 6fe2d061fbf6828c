//! Per-user notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A retest was requested on one of the user's reports.
    Retest,
    /// A fix landed for something the user reported broken.
    Fixed,
    /// General announcement.
    Info,
}

impl NotificationKind {
    /// Wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Retest => "retest",
            NotificationKind::Fixed => "fixed",
            NotificationKind::Info => "info",
        }
    }

    /// Parse the wire string; unknown kinds fall back to `Info`.
    pub fn parse(s: &str) -> Self {
        match s {
            "retest" => NotificationKind::Retest,
            "fixed" => NotificationKind::Fixed,
            _ => NotificationKind::Info,
        }
    }
}

/// A notification row delivered to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Database id.
    pub id: i64,
    /// Kind.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Related report, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    /// Related test, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_key: Option<String>,
    /// Related client version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Admin notes carried over from the triggering retest request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Read flag.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the user read it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_fallback() {
        assert_eq!(NotificationKind::parse("retest"), NotificationKind::Retest);
        assert_eq!(NotificationKind::parse("fixed"), NotificationKind::Fixed);
        assert_eq!(NotificationKind::parse("whatever"), NotificationKind::Info);
    }
}
