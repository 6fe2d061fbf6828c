//! Route table.

use axum::Router;
use axum::routing::{delete, get, post, put};
use serde_json::json;

use crate::auth::AuthLayer;
use crate::handlers::{account, admin, catalog, queue, records, submission};
use crate::state::AppState;

/// Build the full application router.
///
/// Everything under `/api` sits behind [`AuthLayer`] except `/api/register`,
/// which is how a new tester claims an invite.
pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/api/submit", post(submission::submit))
        .route("/api/check_hash", post(submission::check_hash))
        .route("/api/tests", get(catalog::tests))
        .route(
            "/api/versions",
            get(catalog::versions).post(catalog::versions_action),
        )
        .route(
            "/api/retests",
            get(queue::retests).post(queue::complete_retest),
        )
        .route(
            "/api/flag_check",
            get(queue::flag_check).post(queue::acknowledge_flag),
        )
        .route("/api/user", get(account::user))
        .route(
            "/api/session",
            post(account::create_session).delete(account::delete_session),
        )
        .route(
            "/api/notifications",
            get(account::notifications).post(account::notifications_action),
        )
        .route("/api/reports", get(records::reports))
        .route(
            "/api/logs",
            get(records::logs).post(records::logs_action),
        )
        .route("/api/search", get(records::search))
        .route("/api/admin/invites", post(admin::create_invite))
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::users_action),
        )
        .route("/api/admin/versions", put(admin::upsert_version))
        .route("/api/admin/versions/{id}", delete(admin::delete_version))
        .route("/api/admin/notices", post(admin::add_notice))
        .route("/api/admin/notices/{id}", delete(admin::delete_notice))
        .route(
            "/api/admin/tests",
            put(admin::upsert_test).post(admin::tests_action),
        )
        .route("/api/admin/categories", post(admin::create_category))
        .route(
            "/api/admin/categories/{id}",
            delete(admin::delete_category),
        )
        .route("/api/admin/retests", post(admin::request_retest))
        .route(
            "/api/admin/regressions",
            get(admin::list_regressions).post(admin::review_regression),
        )
        .route(
            "/api/admin/settings",
            get(admin::settings).post(admin::set_setting),
        )
        .route("/api/admin/reports/{id}", delete(admin::delete_report))
        .layer(AuthLayer::new(state.clone()));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/register", post(account::register))
        .merge(authed)
        .with_state(state)
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(json!({"success": true, "status": "ok"}))
}
