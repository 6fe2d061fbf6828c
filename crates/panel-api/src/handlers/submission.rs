//! Submission endpoints: `/api/submit` and `/api/check_hash`.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use panel_core::SessionSubmission;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// POST `/api/submit` — record a full session.
///
/// The payload is the tool's `session_results.json`. The response carries
/// one entry per version, including what the store did with it.
pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(submission): Json<SessionSubmission>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    // The key identifies the tester; the payload's tester field is display
    // metadata and may not impersonate anyone else.
    let tester = &user.0.username;
    let outcomes = state.store.submit_session(tester, &submission)?;

    let reports: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            // The wire carries the regressed test keys; the full status
            // transitions live in the stored revision diff.
            let regressions: Vec<&str> =
                o.regressions.iter().map(|c| c.test_key.as_str()).collect();
            json!({
                "report_id": o.report_id,
                "client_version": o.client_version,
                "action": o.action.as_str(),
                "revision": o.revision,
                "tests_recorded": o.tests_recorded,
                "logs_attached": o.logs_attached,
                "regressions": regressions,
                "view_url": state.view_url(o.report_id),
            })
        })
        .collect();

    log::info!(
        "{tester} submitted {} version(s), {} created/updated",
        outcomes.len(),
        outcomes
            .iter()
            .filter(|o| o.action != panel_store::SubmitAction::Skipped)
            .count()
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "reports": reports})),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CheckHashRequest {
    /// Version id → locally computed content hash.
    pub hashes: BTreeMap<String, String>,
    /// Test type the hashes belong to.
    pub test_type: String,
    /// Accepted for compatibility; the authenticated user wins.
    #[serde(default)]
    #[allow(dead_code)]
    pub tester: Option<String>,
}

/// POST `/api/check_hash` — per-version submission precheck.
pub async fn check_hash(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CheckHashRequest>,
) -> ApiResult<Json<Value>> {
    let hashes: Vec<(String, String)> = request.hashes.into_iter().collect();
    let checks = state
        .store
        .check_hashes(&user.0.username, &request.test_type, &hashes)?;

    let results: BTreeMap<String, Value> = checks
        .into_iter()
        .map(|c| {
            let version = c.client_version.clone();
            (version, serde_json::to_value(c).unwrap_or(Value::Null))
        })
        .collect();

    Ok(Json(json!({"success": true, "results": results})))
}
