//! Test Panel client library.
//!
//! What the test tool links against to talk to the panel: configuration,
//! the HTTP client with offline submission queueing, the persistent
//! catalog cache, notes sanitisation, and log compression.
//!
//! # Modules
//!
//! - [`cache`]: Offline cache and pending-submission queue
//! - [`client`]: The [`PanelClient`] itself
//! - [`config`]: Configuration file handling
//! - [`error`]: Error types and Result alias
//! - [`logs`]: Log compression for submissions
//! - [`notes`]: Notes sanitisation before submission

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logs;
pub mod notes;

pub use cache::{DataCache, PendingSubmission};
pub use client::{
    FlagCheck, PanelClient, SubmitOutcome, SubmitResponse, TestsResult, UserInfo,
    VersionHashCheck, VersionsResult,
};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use logs::compress_log_file;
pub use notes::{clean_notes, prepare_submission};
