//! Credential handling: API keys, invites, sessions.

use axum::body::Body;
use http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use panel_api::SESSION_HEADER;

use crate::common::TestHarness;

#[tokio::test]
async fn test_requests_without_credentials_are_rejected() {
    let h = TestHarness::new();
    let (status, body) = h.request(Method::GET, "/api/user", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = h
        .request(Method::GET, "/api/user", Some("sk_bogus"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_check_needs_no_key() {
    let h = TestHarness::new();
    let (status, body) = h.request(Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_invite_registration_mints_a_working_key() {
    let h = TestHarness::new();

    let (status, body) = h
        .post("/api/admin/invites", &h.admin_key, json!({"role": "tester"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let invite = body["invite"].as_str().expect("invite code").to_string();

    let (status, body) = h
        .request(
            Method::POST,
            "/api/register",
            None,
            Some(json!({"invite": invite, "username": "grace"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "grace");
    let key = body["api_key"].as_str().expect("api key").to_string();

    let (status, body) = h.get("/api/user", &key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "grace");
    assert_eq!(body["revisions_count"], 0);
}

#[tokio::test]
async fn test_invite_codes_are_single_use() {
    let h = TestHarness::new();
    let (_, body) = h
        .post("/api/admin/invites", &h.admin_key, json!({}))
        .await;
    let invite = body["invite"].as_str().expect("invite").to_string();

    let register = |name: &str| {
        json!({"invite": invite.clone(), "username": name})
    };
    let (status, _) = h
        .request(Method::POST, "/api/register", None, Some(register("one")))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h
        .request(Method::POST, "/api/register", None, Some(register("two")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_token_round_trip() {
    let h = TestHarness::new();

    let (status, body) = h
        .post("/api/session", &h.tester_key, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/user")
        .header(SESSION_HEADER, &token)
        .body(Body::empty())
        .expect("request");
    let response = h.router.clone().oneshot(request).await.expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = h
        .request(
            Method::DELETE,
            "/api/session",
            Some(&h.tester_key),
            Some(json!({"token": token.clone()})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/user")
        .header(SESSION_HEADER, &token)
        .body(Body::empty())
        .expect("request");
    let response = h.router.clone().oneshot(request).await.expect("infallible");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_refuse_testers() {
    let h = TestHarness::new();
    let (status, body) = h.get("/api/admin/users", &h.tester_key).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = h.get("/api/admin/users", &h.admin_key).await;
    assert_eq!(status, StatusCode::OK);
    // boss + ada from the harness
    assert_eq!(body["users"].as_array().expect("users").len(), 2);
}

#[tokio::test]
async fn test_disabled_users_lose_access() {
    let h = TestHarness::new();
    let tester = h
        .store
        .user_by_name(&h.tester_name)
        .expect("lookup")
        .expect("tester exists");

    let (status, _) = h
        .post(
            "/api/admin/users",
            &h.admin_key,
            json!({"action": "set_enabled", "user_id": tester.id, "enabled": false}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h.get("/api/user", &h.tester_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
