//! Test Panel GitHub mirror.
//!
//! Keeps an incremental, on-disk cache of the emulator repository's commit
//! history so the panel can show testers what changed between their runs
//! without hitting the GitHub API on every page load.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`types`]: Mirrored commit shapes served to the tool
//! - [`cache`]: The JSON cache file
//! - [`lock`]: Cross-process fetch lock
//! - [`mirror`]: The fetching mirror itself

pub mod cache;
pub mod error;
pub mod lock;
pub mod mirror;
pub mod types;

pub use cache::MirrorCache;
pub use error::{Error, Result};
pub use lock::CacheLock;
pub use mirror::CommitMirror;
pub use types::{CommitInfo, FileChanges};
