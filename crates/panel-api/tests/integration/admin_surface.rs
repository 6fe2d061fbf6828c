//! Admin catalog management and the endpoints backing the review UI.

use http::{Method, StatusCode};
use serde_json::json;

use crate::common::{TestHarness, VERSION, submission_body, uniform_results};

#[tokio::test]
async fn test_version_upsert_and_notice_lifecycle() {
    let h = TestHarness::new();

    let (status, _) = h
        .request(
            Method::PUT,
            "/api/admin/versions",
            Some(&h.admin_key),
            Some(json!({
                "id": "secondblob.bin.2004-06-20",
                "display_name": "Steam June 2004",
                "packages": ["Steam_20"],
                "sort_order": 1,
                "is_enabled": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, notice) = h
        .post(
            "/api/admin/notices",
            &h.admin_key,
            json!({
                "version_id": "secondblob.bin.2004-06-20",
                "name": "Known issue",
                "message": "Server browser is empty on this build.",
            }),
        )
        .await;
    let notice_id = notice["notice_id"].as_i64().expect("notice id");

    // Testers see the notice embedded in the version listing.
    let (_, versions) = h
        .get("/api/versions?notifications=1", &h.tester_key)
        .await;
    let listed = versions["versions"].as_array().expect("versions");
    assert_eq!(listed.len(), 2);

    let (status, _) = h
        .request(
            Method::DELETE,
            &format!("/api/admin/notices/{notice_id}"),
            Some(&h.admin_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .request(
            Method::DELETE,
            "/api/admin/versions/secondblob.bin.2004-06-20",
            Some(&h.admin_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, versions) = h.get("/api/versions", &h.tester_key).await;
    assert_eq!(versions["versions"].as_array().expect("versions").len(), 1);
}

#[tokio::test]
async fn test_disabling_a_test_removes_it_from_the_battery() {
    let h = TestHarness::new();

    let (_, before) = h.get("/api/tests", &h.tester_key).await;
    let count_before = before["tests"].as_array().expect("tests").len();

    let (status, _) = h
        .post(
            "/api/admin/tests",
            &h.admin_key,
            json!({"action": "set_enabled", "test_key": "1", "enabled": false}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = h.get("/api/tests", &h.tester_key).await;
    assert_eq!(
        after["tests"].as_array().expect("tests").len(),
        count_before - 1
    );

    // all=1 still shows it for the admin UI.
    let (_, all) = h.get("/api/tests?all=1", &h.admin_key).await;
    assert_eq!(all["tests"].as_array().expect("tests").len(), count_before);
}

#[tokio::test]
async fn test_version_battery_pinning() {
    let h = TestHarness::new();
    let (status, _) = h
        .post(
            "/api/admin/tests",
            &h.admin_key,
            json!({
                "action": "pin_version_tests",
                "version_id": VERSION,
                "test_keys": ["1", "2", "3"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, tests) = h
        .get(&format!("/api/tests?client_version={VERSION}"), &h.tester_key)
        .await;
    assert_eq!(tests["tests"].as_array().expect("tests").len(), 3);
}

#[tokio::test]
async fn test_regression_review() {
    let h = TestHarness::new();
    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(&h.tester_name, "abc1234", uniform_results(&["1"], "Working")),
    )
    .await;
    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(
            &h.tester_name,
            "def5678",
            uniform_results(&["1"], "Not working"),
        ),
    )
    .await;

    let (_, flags) = h.get("/api/admin/regressions", &h.admin_key).await;
    let regressions = flags["regressions"].as_array().expect("regressions");
    assert_eq!(regressions.len(), 1);
    assert_eq!(regressions[0]["test_key"], "1");
    let flag_id = regressions[0]["id"].as_i64().expect("flag id");

    let (status, _) = h
        .post("/api/admin/regressions", &h.admin_key, json!({"id": flag_id}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, flags) = h.get("/api/admin/regressions", &h.admin_key).await;
    assert!(flags["regressions"].as_array().expect("regressions").is_empty());
}

#[tokio::test]
async fn test_settings_round_trip() {
    let h = TestHarness::new();
    let (_, settings) = h.get("/api/admin/settings", &h.admin_key).await;
    assert_eq!(settings["settings"]["session_ttl_hours"], "72");

    let (status, _) = h
        .post(
            "/api/admin/settings",
            &h.admin_key,
            json!({"key": "session_ttl_hours", "value": "24"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, settings) = h.get("/api/admin/settings", &h.admin_key).await;
    assert_eq!(settings["settings"]["session_ttl_hours"], "24");
}

#[tokio::test]
async fn test_report_deletion_is_admin_only() {
    let h = TestHarness::new();
    let (_, response) = h
        .post(
            "/api/submit",
            &h.tester_key,
            submission_body(&h.tester_name, "abc1234", uniform_results(&["1"], "Working")),
        )
        .await;
    let report_id = response["reports"][0]["report_id"].as_i64().expect("id");

    let (status, _) = h
        .request(
            Method::DELETE,
            &format!("/api/admin/reports/{report_id}"),
            Some(&h.tester_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .request(
            Method::DELETE,
            &format!("/api/admin/reports/{report_id}"),
            Some(&h.admin_key),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, reports) = h.get("/api/reports", &h.tester_key).await;
    assert!(reports["reports"].as_array().expect("reports").is_empty());
}

#[tokio::test]
async fn test_search_spans_tests_versions_and_reports() {
    let h = TestHarness::new();
    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(&h.tester_name, "abc1234", uniform_results(&["1"], "Working")),
    )
    .await;

    let (status, results) = h.get("/api/search?q=secondblob", &h.tester_key).await;
    assert_eq!(status, StatusCode::OK);
    assert!(results["total"].as_u64().expect("total") >= 1);

    let (status, _) = h.get("/api/search?q=", &h.tester_key).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
