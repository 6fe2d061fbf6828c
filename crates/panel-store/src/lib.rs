//! Test Panel persistence layer.
//!
//! SQLite-backed storage for everything the panel tracks: users and API
//! keys, the test taxonomy, client versions, report submissions with
//! archive-on-update revision history, attached logs, the retest queue,
//! notifications, and site settings.
//!
//! The [`Store`] owns a single connection behind a mutex. The panel is
//! low-traffic admin tooling; writes are short transactions and readers
//! never hold the lock across I/O.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`schema`]: Migrations and the seeded test battery
//! - [`users`]: Users, sessions, invites
//! - [`taxonomy`]: Categories, tests, version templates
//! - [`versions`]: Client versions and notices
//! - [`reports`]: Submission, hashing precheck, revision archive
//! - [`logs`]: Attached report logs
//! - [`retests`]: Retest queue and regression flags
//! - [`notifications`]: Per-user notifications
//! - [`settings`]: Site settings key/value store
//! - [`search`]: Panel-wide search

pub mod error;
pub mod logs;
pub mod notifications;
pub mod reports;
pub mod retests;
pub mod schema;
pub mod search;
pub mod settings;
mod store;
pub mod taxonomy;
pub mod users;
pub mod versions;

pub use error::{Error, Result};
pub use reports::{HashCheck, Report, ReportFilter, ReportRevision, SubmitAction, SubmitOutcome};
pub use logs::{LogDownload, LogEntry};
pub use search::SearchResults;
pub use retests::{RegressionFlag, RetestRequest};
pub use store::Store;
pub use users::{Role, Session, User};
