//! Shared application state.

use std::sync::Arc;

use panel_github::CommitMirror;
use panel_store::Store;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The database.
    pub store: Arc<Store>,
    /// GitHub commit mirror; absent when no repository is configured.
    pub mirror: Option<Arc<CommitMirror>>,
    /// Base URL used to build report view links in submit responses.
    pub view_base_url: String,
}

impl AppState {
    /// State with no commit mirror.
    pub fn new(store: Arc<Store>, view_base_url: impl Into<String>) -> Self {
        Self {
            store,
            mirror: None,
            view_base_url: view_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Attach a commit mirror.
    pub fn with_mirror(mut self, mirror: Arc<CommitMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// View link for one report.
    pub fn view_url(&self, report_id: i64) -> String {
        format!("{}/reports/{report_id}", self.view_base_url)
    }
}
