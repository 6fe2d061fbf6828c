//! Test Panel core — shared domain types for the compatibility test panel.
//!
//! This crate provides the types used across all panel crates. It has no
//! internal panel dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`status`]: Test status ordering and regression rules
//! - [`hash`]: Canonical content hashing for report payloads
//! - [`diff`]: Revision diffing between report payloads
//! - [`report`]: Submission payload and report types
//! - [`taxonomy`]: Test categories and definitions
//! - [`version`]: Client versions and version notices
//! - [`retest`]: Retest queue items
//! - [`notification`]: Per-user notifications
//! - [`apikey`]: API key minting and digests

pub mod apikey;
pub mod diff;
pub mod error;
pub mod hash;
pub mod notification;
pub mod report;
pub mod retest;
pub mod status;
pub mod taxonomy;
pub mod version;

// Re-export key types at crate root for convenience
pub use diff::{ReportDiff, StatusChange};
pub use error::{Error, Result};
pub use hash::content_hash;
pub use report::{AttachedLog, SessionSubmission, SubmissionMeta, TestResult, VersionResults};
pub use status::TestStatus;
