//! Retest queue endpoints: `/api/retests` and `/api/flag_check`.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RetestsQuery {
    /// Only items for this version.
    #[serde(default)]
    pub client_version: Option<String>,
}

/// GET `/api/retests` — the caller's open queue.
pub async fn retests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<RetestsQuery>,
) -> ApiResult<Json<Value>> {
    let mut items = state.store.pending_retests(&user.0.username)?;
    if let Some(version) = &query.client_version {
        items.retain(|item| &item.client_version == version);
    }
    Ok(Json(json!({"success": true, "retest_queue": items})))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    /// Item id.
    pub id: i64,
    /// "retest" or "fixed"; informational, the id is authoritative.
    #[serde(rename = "type", default)]
    #[allow(dead_code)]
    pub kind: Option<String>,
    /// Outcome status for fix confirmations.
    #[serde(default)]
    pub new_status: Option<String>,
}

/// POST `/api/retests` — mark an item done.
pub async fn complete_retest(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CompleteRequest>,
) -> ApiResult<Json<Value>> {
    if let Some(status) = &request.new_status {
        // Reject unknown statuses before touching the queue.
        panel_core::TestStatus::parse(status)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }
    state.store.complete_retest(
        request.id,
        &user.0.username,
        request.new_status.as_deref(),
    )?;
    Ok(Json(json!({"success": true})))
}

/// GET `/api/flag_check` — lightweight poll for unseen queue items.
pub async fn flag_check(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let flags = state.store.unacknowledged_retests(&user.0.username)?;
    Ok(Json(json!({
        "success": true,
        "count": flags.len(),
        "flags": flags,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    /// Item id.
    pub id: i64,
    /// "retest" or "fixed"; informational.
    #[serde(rename = "type", default)]
    #[allow(dead_code)]
    pub kind: Option<String>,
}

/// POST `/api/flag_check` — acknowledge one polled item.
pub async fn acknowledge_flag(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<AcknowledgeRequest>,
) -> ApiResult<Json<Value>> {
    let acked = state
        .store
        .acknowledge_retests(&user.0.username, &[request.id])?;
    if acked == 0 {
        return Err(ApiError::NotFound(format!("flag '{}'", request.id)));
    }
    Ok(Json(json!({"success": true})))
}
