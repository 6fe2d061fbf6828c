//! Read endpoints over stored reports: `/api/reports`, `/api/logs` and
//! `/api/search`.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use panel_store::ReportFilter;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReportsQuery {
    #[serde(default)]
    pub tester: Option<String>,
    #[serde(default, rename = "version")]
    pub client_version: Option<String>,
    #[serde(default, rename = "type")]
    pub test_type: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Include the revision history of each report.
    #[serde(default)]
    pub revisions: Option<bool>,
}

/// GET `/api/reports` — filtered report listing.
///
/// Testers only see their own reports; admins can filter by any tester.
pub async fn reports(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Json<Value>> {
    let tester = if user.0.is_admin() {
        query.tester
    } else {
        Some(user.0.username.clone())
    };
    let filter = ReportFilter {
        tester,
        client_version: query.client_version,
        test_type: query.test_type,
        limit: query.limit,
    };
    let reports = state.store.list_reports(&filter)?;
    if query.revisions.unwrap_or(false) {
        let mut detailed = Vec::with_capacity(reports.len());
        for report in reports {
            let revisions = state.store.report_revisions(report.id)?;
            let mut value = serde_json::to_value(&report)
                .map_err(|e| ApiError::Internal(Box::new(e)))?;
            value["revisions"] = serde_json::to_value(revisions)
                .map_err(|e| ApiError::Internal(Box::new(e)))?;
            detailed.push(value);
        }
        return Ok(Json(json!({"success": true, "reports": detailed})));
    }
    Ok(Json(json!({"success": true, "reports": reports})))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub report_id: Option<i64>,
    #[serde(default)]
    pub log_id: Option<i64>,
}

/// GET `/api/logs` — list a report's logs, or download one by id.
pub async fn logs(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Value>> {
    if let Some(log_id) = query.log_id {
        let log = state.store.download_log(log_id)?;
        let report = state.store.report_by_id(log.entry.report_id)?;
        require_report_access(&user, &report.tester)?;
        return Ok(Json(json!({"success": true, "log": log})));
    }
    if let Some(report_id) = query.report_id {
        let report = state.store.report_by_id(report_id)?;
        require_report_access(&user, &report.tester)?;
        let logs = state.store.logs_for_report(report_id)?;
        return Ok(Json(json!({"success": true, "logs": logs})));
    }
    Err(ApiError::BadRequest(
        "either report_id or log_id is required".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LogsAction {
    Delete { log_id: i64 },
}

/// POST `/api/logs` — log management; admin only.
pub async fn logs_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(action): Json<LogsAction>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    match action {
        LogsAction::Delete { log_id } => {
            state.store.delete_log(log_id)?;
            Ok(Json(json!({"success": true})))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

const SEARCH_LIMIT: usize = 50;

/// GET `/api/search` — substring search across tests, versions and reports.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let needle = query.q.trim();
    if needle.is_empty() {
        return Err(ApiError::BadRequest("empty search query".to_string()));
    }
    let limit = query.limit.unwrap_or(SEARCH_LIMIT).min(SEARCH_LIMIT);
    let results = state.store.search(needle, limit)?;
    Ok(Json(json!({
        "success": true,
        "total": results.total(),
        "results": results,
    })))
}

fn require_report_access(user: &CurrentUser, tester: &str) -> ApiResult<()> {
    if user.0.is_admin() || user.0.username == tester {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
