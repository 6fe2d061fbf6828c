//! Catalog endpoints: `/api/tests` and `/api/versions`.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use panel_core::taxonomy::TestDefinition;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TestsQuery {
    /// `all=1` includes disabled tests.
    #[serde(default)]
    pub all: Option<String>,
    /// Scope the battery to one version.
    #[serde(default)]
    pub client_version: Option<String>,
}

fn grouped_by_category(tests: &[TestDefinition]) -> BTreeMap<String, Vec<&TestDefinition>> {
    let mut grouped: BTreeMap<String, Vec<&TestDefinition>> = BTreeMap::new();
    for test in tests {
        grouped.entry(test.category_name.clone()).or_default().push(test);
    }
    grouped
}

/// GET `/api/tests` — the battery, grouped by category.
pub async fn tests(
    State(state): State<AppState>,
    Query(query): Query<TestsQuery>,
) -> ApiResult<Json<Value>> {
    let include_disabled = query.all.as_deref() == Some("1");

    let (tests, skip_tests) = match &query.client_version {
        Some(version_id) => {
            let version = state
                .store
                .version_by_id(version_id)?
                .ok_or_else(|| ApiError::NotFound(format!("version '{version_id}'")))?;
            (state.store.tests_for_version(version_id)?, version.skip_tests)
        }
        None => (state.store.list_tests(include_disabled)?, Vec::new()),
    };

    let categories = state.store.list_categories()?;
    let grouped = grouped_by_category(&tests);

    Ok(Json(json!({
        "success": true,
        "categories": categories,
        "tests": tests,
        "grouped": grouped,
        "skip_tests": skip_tests,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionsQuery {
    /// `all=1` includes disabled versions.
    #[serde(default)]
    pub all: Option<String>,
    /// `notifications=1` embeds each version's notices.
    #[serde(default)]
    pub notifications: Option<String>,
}

/// GET `/api/versions` — client versions, optionally with notices.
pub async fn versions(
    State(state): State<AppState>,
    Query(query): Query<VersionsQuery>,
) -> ApiResult<Json<Value>> {
    let include_disabled = query.all.as_deref() == Some("1");
    let with_notices = query.notifications.as_deref() == Some("1");

    let versions = state.store.list_versions(include_disabled)?;
    let mut out = Vec::with_capacity(versions.len());
    for version in versions {
        let mut value = serde_json::to_value(&version)
            .map_err(|e| ApiError::Internal(Box::new(e)))?;
        if with_notices {
            let notices = state.store.version_notices(&version.id, None)?;
            value["notification_count"] = json!(notices.len());
            value["notifications"] = serde_json::to_value(notices)
                .map_err(|e| ApiError::Internal(Box::new(e)))?;
        }
        out.push(value);
    }

    Ok(Json(json!({"success": true, "versions": out})))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VersionsAction {
    /// Notices for one version.
    GetNotifications {
        version_id: String,
        #[serde(default)]
        commit_hash: Option<String>,
    },
    /// Notices for several versions in one call.
    GetNotificationsBatch {
        version_ids: Vec<String>,
        #[serde(default)]
        commit_hash: Option<String>,
    },
}

/// POST `/api/versions` — notice lookups.
pub async fn versions_action(
    State(state): State<AppState>,
    Json(action): Json<VersionsAction>,
) -> ApiResult<Json<Value>> {
    match action {
        VersionsAction::GetNotifications {
            version_id,
            commit_hash,
        } => {
            let mut notices = state
                .store
                .version_notices(&version_id, commit_hash.as_deref())?;
            // Oldest first; the tool stacks them in arrival order.
            notices.reverse();
            Ok(Json(json!({"success": true, "notifications": notices})))
        }
        VersionsAction::GetNotificationsBatch {
            version_ids,
            commit_hash,
        } => {
            let by_version = state
                .store
                .version_notices_batch(&version_ids, commit_hash.as_deref())?;
            Ok(Json(
                json!({"success": true, "notifications_by_version": by_version}),
            ))
        }
    }
}
