//! Submission payload and report types.
//!
//! The test tool writes a `session_results.json` and posts it (possibly
//! filtered down to changed versions) to the submit endpoint. Results are
//! kept as raw JSON per version so the content hash sees exactly the bytes
//! the tool hashed; typed views are parsed on demand for diffing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::status::TestStatus;

/// Session metadata sent with every submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionMeta {
    /// Tester display name.
    #[serde(default)]
    pub tester: String,
    /// Emulator commit the session was run against.
    #[serde(default)]
    pub commit: String,
    /// WAN battery was exercised.
    #[serde(rename = "WAN", default)]
    pub wan: bool,
    /// LAN battery was exercised.
    #[serde(rename = "LAN", default)]
    pub lan: bool,
    /// Local emulator path; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_path: Option<String>,
}

impl SubmissionMeta {
    /// The report's test type label derived from the WAN/LAN flags.
    pub fn test_type(&self) -> &'static str {
        match (self.wan, self.lan) {
            (true, true) => "WAN/LAN",
            (false, true) => "LAN",
            // The tool defaults to WAN when neither box is ticked.
            _ => "WAN",
        }
    }

    /// Validate the fields the panel requires.
    pub fn validate(&self) -> Result<()> {
        if self.tester.trim().is_empty() {
            return Err(Error::validation_field("tester", "must not be empty"));
        }
        Ok(())
    }
}

/// A full session submission as posted by the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSubmission {
    /// Session metadata.
    pub meta: SubmissionMeta,
    /// Per-version raw result objects, keyed by version id.
    pub results: BTreeMap<String, Value>,
    /// Per-version attached log lists, keyed by version id.
    #[serde(default)]
    pub attached_logs: BTreeMap<String, Vec<Value>>,
    /// Steam/SteamUI package mapping; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_packages: Option<Value>,
}

impl SessionSubmission {
    /// Validate the submission shape before any storage work happens.
    pub fn validate(&self) -> Result<()> {
        self.meta.validate()?;
        if self.results.is_empty() {
            return Err(Error::validation_field("results", "must not be empty"));
        }
        for (version_id, results) in &self.results {
            if !results.is_object() {
                return Err(Error::validation_field(
                    format!("results.{version_id}"),
                    "must be an object of test results",
                ));
            }
        }
        Ok(())
    }
}

/// A single typed test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Reported status (one of the five wire strings).
    #[serde(default)]
    pub status: String,
    /// Tester notes, markdown with optional image markers.
    #[serde(default)]
    pub notes: String,
}

impl TestResult {
    /// Parse the status field.
    pub fn status(&self) -> Result<TestStatus> {
        Ok(TestStatus::parse(&self.status)?)
    }
}

/// Typed per-version results: test key → result.
pub type VersionResults = BTreeMap<String, TestResult>;

/// Parse a raw per-version result object into its typed form.
///
/// Unknown per-test fields are ignored; the raw value remains the hashing
/// source of truth.
pub fn parse_results(raw: &Value) -> Result<VersionResults> {
    let obj = raw
        .as_object()
        .ok_or_else(|| Error::validation("version results must be an object"))?;
    let mut out = VersionResults::new();
    for (test_key, entry) in obj {
        let result: TestResult = serde_json::from_value(entry.clone())
            .map_err(|_| Error::validation_field(test_key.clone(), "malformed test result"))?;
        out.insert(test_key.clone(), result);
    }
    Ok(out)
}

/// A log file attached to a report submission.
///
/// `data` is base64 of zlib-compressed content; sizes are declared by the
/// tool and re-verified on attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedLog {
    /// Original log filename.
    pub filename: String,
    /// Log timestamp as formatted by the tool (`%Y-%m-%d %H:%M:%S`).
    #[serde(default)]
    pub datetime: String,
    /// Uncompressed size in bytes.
    #[serde(default)]
    pub size_original: u64,
    /// Compressed size in bytes.
    #[serde(default)]
    pub size_compressed: u64,
    /// Base64-encoded zlib stream.
    pub data: String,
}
