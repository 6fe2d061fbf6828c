//! Common test utilities for the API integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use panel_api::{API_KEY_HEADER, AppState, build_router};
use panel_core::version::ClientVersion;
use panel_store::Store;
use panel_store::users::Role;

/// The version id every harness seeds.
pub const VERSION: &str = "secondblob.bin.2004-01-15";

/// Test harness: the router over an in-memory store, with one admin and
/// one tester already registered.
pub struct TestHarness {
    pub router: Router,
    pub store: Arc<Store>,
    pub admin_key: String,
    pub tester_key: String,
    pub tester_name: String,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(Store::open_in_memory().expect("in-memory store"));
        store
            .upsert_version(&ClientVersion {
                id: VERSION.to_string(),
                display_name: Some("Steam January 2004".to_string()),
                packages: vec!["Steam_14".to_string(), "SteamUI_51".to_string()],
                steam_date: Some("2004-01-15".to_string()),
                steam_time: Some("12:00:00".to_string()),
                skip_tests: Vec::new(),
                sort_order: 0,
                is_enabled: true,
            })
            .expect("seed version");
        let admin_key = mint(&store, Role::Admin, "boss");
        let tester_key = mint(&store, Role::Tester, "ada");
        let state = AppState::new(Arc::clone(&store), "https://panel.example");
        Self {
            router: build_router(state),
            store,
            admin_key,
            tester_key,
            tester_name: "ada".to_string(),
        }
    }

    /// One request against the router; returns status and parsed JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, key: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(key), None).await
    }

    pub async fn post(&self, path: &str, key: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(key), Some(body)).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn mint(store: &Store, role: Role, name: &str) -> String {
    let code = store.create_invite(role, Some("seed")).expect("invite");
    let (_, key) = store.claim_invite(&code, name).expect("claim");
    key
}

/// A WAN submission body for the seeded version.
pub fn submission_body(tester: &str, commit: &str, results: Value) -> Value {
    json!({
        "meta": {
            "tester": tester,
            "commit": commit,
            "WAN": true,
            "LAN": false,
        },
        "results": { VERSION: results },
        "attached_logs": {},
    })
}

/// Raw results with every key set to the same status.
pub fn uniform_results(keys: &[&str], status: &str) -> Value {
    let mut map = serde_json::Map::new();
    for key in keys {
        map.insert(
            (*key).to_string(),
            json!({"status": status, "notes": ""}),
        );
    }
    Value::Object(map)
}
