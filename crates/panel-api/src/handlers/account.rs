//! Account endpoints: `/api/user`, `/api/session` and `/api/notifications`.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub invite: String,
    pub username: String,
}

/// POST `/api/register` — claim an invite code.
///
/// The only route outside the auth layer besides the health check: the
/// caller has no credentials yet. Returns the minted API key exactly once.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    let (user, api_key) = state.store.claim_invite(&request.invite, username)?;
    Ok(Json(json!({
        "success": true,
        "user": {
            "username": user.username,
            "role": user.role.as_str(),
        },
        "api_key": api_key,
    })))
}

/// GET `/api/user` — identity check plus the commit mirror snapshot.
///
/// The tool calls this once at startup; shipping the revision map here
/// saves it a second round trip.
pub async fn user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let revisions = match &state.mirror {
        Some(mirror) => mirror.revisions().await?,
        None => BTreeMap::new(),
    };
    Ok(Json(json!({
        "success": true,
        "user": {
            "username": user.0.username,
            "role": user.0.role.as_str(),
        },
        "revisions_count": revisions.len(),
        "revisions": revisions,
    })))
}

/// POST `/api/session` — exchange an API key for a browser session token.
///
/// The auth layer has already validated the key, so this only mints the
/// token.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let ttl_hours = state.store.setting_i64("session_ttl_hours", 72)?;
    let session = state.store.create_session(user.0.id, ttl_hours)?;
    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "expires_at": session.expires_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteSessionRequest {
    pub token: String,
}

/// DELETE `/api/session` — drop a session token.
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<DeleteSessionRequest>,
) -> ApiResult<Json<Value>> {
    // Tokens are unguessable, but still refuse to delete another user's.
    match state.store.user_by_session(&request.token)? {
        Some(owner) if owner.id == user.0.id => {
            state.store.delete_session(&request.token)?;
            Ok(Json(json!({"success": true})))
        }
        _ => Err(ApiError::NotFound("session".to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET `/api/notifications` — the caller's notifications, newest first.
pub async fn notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Json<Value>> {
    let unread_only = query.unread.unwrap_or(false);
    let mut items = state.store.notifications_for(user.0.id, unread_only)?;
    if let Some(limit) = query.limit {
        items.truncate(limit);
    }
    let unread_count = state.store.unread_notification_count(user.0.id)?;
    Ok(Json(json!({
        "success": true,
        "unread_count": unread_count,
        "notifications": items,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NotificationsAction {
    MarkRead { notification_id: i64 },
    MarkAllRead,
}

/// POST `/api/notifications` — mark one or all notifications read.
pub async fn notifications_action(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(action): Json<NotificationsAction>,
) -> ApiResult<Json<Value>> {
    match action {
        NotificationsAction::MarkRead { notification_id } => {
            state
                .store
                .mark_notification_read(user.0.id, notification_id)?;
            Ok(Json(json!({"success": true})))
        }
        NotificationsAction::MarkAllRead => {
            let marked = state.store.mark_all_notifications_read(user.0.id)?;
            Ok(Json(json!({"success": true, "marked": marked})))
        }
    }
}
