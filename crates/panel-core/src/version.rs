//! Client versions and version notices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client build testers run the battery against.
///
/// Version ids are the blob filenames the emulator serves
/// (e.g. `secondblob.bin.2004-01-15`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientVersion {
    /// Stable version id string.
    pub id: String,
    /// Friendly name shown in the tool, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Package labels ("Steam_14", "SteamUI_51", ...).
    #[serde(default)]
    pub packages: Vec<String>,
    /// Steam content date for the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_date: Option<String>,
    /// Steam content time for the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_time: Option<String>,
    /// Tests that do not apply to this build.
    #[serde(default)]
    pub skip_tests: Vec<String>,
    /// Listing order.
    #[serde(default)]
    pub sort_order: i64,
    /// Disabled versions are hidden from testers.
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

fn enabled() -> bool {
    true
}

/// A known issue or instruction attached to a version.
///
/// Notices optionally pin to a commit hash so they only surface for sessions
/// against that revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionNotice {
    /// Database id.
    pub id: i64,
    /// Short title.
    pub name: String,
    /// Full message shown to testers.
    pub message: String,
    /// Commit the notice applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// When the notice was created.
    pub created_at: DateTime<Utc>,
    /// Admin who created it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl VersionNotice {
    /// Whether the notice should be shown for a session against
    /// `commit_hash` (unpinned notices always show).
    pub fn applies_to(&self, commit_hash: Option<&str>) -> bool {
        match (&self.commit_hash, commit_hash) {
            (None, _) => true,
            (Some(pinned), Some(session)) => pinned == session,
            (Some(_), None) => false,
        }
    }
}
