//! Admin endpoints under `/api/admin/*`.
//!
//! Everything here calls `require_admin()` first; the routes are still
//! mounted behind the shared auth layer so a missing key is a 401 and a
//! non-admin key is a 403.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use panel_core::retest::RetestKind;
use panel_core::taxonomy::TestDefinition;
use panel_core::version::ClientVersion;
use panel_store::{RetestRequest, Role};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub role: Option<String>,
}

/// POST `/api/admin/invites` — mint an invite code.
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<InviteRequest>,
) -> ApiResult<Json<Value>> {
    let admin = user.require_admin()?;
    let role = Role::parse(request.role.as_deref().unwrap_or("tester"));
    let code = state.store.create_invite(role, Some(&admin.username))?;
    Ok(Json(json!({
        "success": true,
        "invite": code,
        "role": role.as_str(),
    })))
}

/// GET `/api/admin/users` — every account, enabled or not.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let users = state.store.list_users()?;
    Ok(Json(json!({"success": true, "users": users})))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UsersAction {
    SetEnabled { user_id: i64, enabled: bool },
    RotateKey { user_id: i64 },
}

/// POST `/api/admin/users` — enable, disable or re-key an account.
pub async fn users_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(action): Json<UsersAction>,
) -> ApiResult<Json<Value>> {
    let admin = user.require_admin()?;
    match action {
        UsersAction::SetEnabled { user_id, enabled } => {
            if user_id == admin.id && !enabled {
                return Err(ApiError::BadRequest(
                    "cannot disable your own account".to_string(),
                ));
            }
            state.store.set_user_enabled(user_id, enabled)?;
            Ok(Json(json!({"success": true})))
        }
        UsersAction::RotateKey { user_id } => {
            let api_key = state.store.rotate_api_key(user_id)?;
            Ok(Json(json!({"success": true, "api_key": api_key})))
        }
    }
}

/// PUT `/api/admin/versions` — create or update a client version.
pub async fn upsert_version(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(version): Json<ClientVersion>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    if version.id.trim().is_empty() {
        return Err(ApiError::BadRequest("version id is required".to_string()));
    }
    state.store.upsert_version(&version)?;
    Ok(Json(json!({"success": true, "version_id": version.id})))
}

/// DELETE `/api/admin/versions/{id}` — remove a version and its notices.
pub async fn delete_version(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.store.delete_version(&id)?;
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct NoticeRequest {
    pub version_id: String,
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
}

/// POST `/api/admin/notices` — attach a notice to a version.
pub async fn add_notice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<NoticeRequest>,
) -> ApiResult<Json<Value>> {
    let admin = user.require_admin()?;
    let id = state.store.add_version_notice(
        &request.version_id,
        &request.name,
        &request.message,
        request.commit_hash.as_deref(),
        Some(&admin.username),
    )?;
    Ok(Json(json!({"success": true, "notice_id": id})))
}

/// DELETE `/api/admin/notices/{id}`.
pub async fn delete_notice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.store.delete_version_notice(id)?;
    Ok(Json(json!({"success": true})))
}

/// PUT `/api/admin/tests` — create or update a battery entry.
pub async fn upsert_test(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(def): Json<TestDefinition>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    if def.test_key.trim().is_empty() {
        return Err(ApiError::BadRequest("test_key is required".to_string()));
    }
    state.store.upsert_test(&def)?;
    Ok(Json(json!({"success": true, "test_key": def.test_key})))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestsAction {
    SetEnabled { test_key: String, enabled: bool },
    PinVersionTests { version_id: String, test_keys: Vec<String> },
}

/// POST `/api/admin/tests` — toggle a test or pin a version's battery.
pub async fn tests_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(action): Json<TestsAction>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    match action {
        TestsAction::SetEnabled { test_key, enabled } => {
            state.store.set_test_enabled(&test_key, enabled)?;
        }
        TestsAction::PinVersionTests { version_id, test_keys } => {
            state.store.set_version_tests(&version_id, &test_keys)?;
        }
    }
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
}

/// POST `/api/admin/categories`.
pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<CategoryRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let id = state
        .store
        .create_category(&request.name, request.sort_order)?;
    Ok(Json(json!({"success": true, "category_id": id})))
}

/// DELETE `/api/admin/categories/{id}`.
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.store.delete_category(id)?;
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct RetestBody {
    #[serde(rename = "type")]
    pub kind: RetestKind,
    pub tester: String,
    pub test_key: String,
    pub client_version: String,
    pub reason: String,
    #[serde(default)]
    pub latest_revision: bool,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub report_id: Option<i64>,
}

/// POST `/api/admin/retests` — queue a retest or fix confirmation.
pub async fn request_retest(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RetestBody>,
) -> ApiResult<Json<Value>> {
    let admin = user.require_admin()?;
    let id = state.store.request_retest(&RetestRequest {
        kind: body.kind,
        tester: body.tester,
        test_key: body.test_key,
        client_version: body.client_version,
        reason: body.reason,
        latest_revision: body.latest_revision,
        commit_hash: body.commit_hash,
        notes: body.notes,
        report_id: body.report_id,
        created_by: Some(admin.username.clone()),
    })?;
    Ok(Json(json!({"success": true, "retest_id": id})))
}

/// GET `/api/admin/regressions` — auto-raised flags awaiting review.
pub async fn list_regressions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let regressions = state.store.unreviewed_regressions()?;
    Ok(Json(json!({"success": true, "regressions": regressions})))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub id: i64,
}

/// POST `/api/admin/regressions` — mark a flag reviewed.
pub async fn review_regression(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    let admin = user.require_admin()?;
    state
        .store
        .review_regression(request.id, &admin.username)?;
    Ok(Json(json!({"success": true})))
}

/// GET `/api/admin/settings`.
pub async fn settings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let settings = state.store.all_settings()?;
    Ok(Json(json!({"success": true, "settings": settings})))
}

#[derive(Debug, Deserialize)]
pub struct SettingRequest {
    pub key: String,
    pub value: String,
}

/// POST `/api/admin/settings` — upsert one setting.
pub async fn set_setting(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<SettingRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    if request.key.trim().is_empty() {
        return Err(ApiError::BadRequest("setting key is required".to_string()));
    }
    state.store.set_setting(&request.key, &request.value)?;
    Ok(Json(json!({"success": true})))
}

/// DELETE `/api/admin/reports/{id}` — drop a report and its history.
pub async fn delete_report(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.store.delete_report(id)?;
    Ok(Json(json!({"success": true})))
}
