//! The submit / check-hash / retest loop as the tool drives it.

use http::StatusCode;
use serde_json::json;

use panel_core::content_hash;

use crate::common::{TestHarness, VERSION, submission_body, uniform_results};

#[tokio::test]
async fn test_first_submission_creates_a_report() {
    let h = TestHarness::new();
    let results = uniform_results(&["1", "2", "3"], "Working");
    let body = submission_body(&h.tester_name, "abc1234", results);

    let (status, response) = h.post("/api/submit", &h.tester_key, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["success"], true);

    let report = &response["reports"][0];
    assert_eq!(report["client_version"], VERSION);
    assert_eq!(report["action"], "created");
    assert_eq!(report["revision"], 0);
    assert_eq!(report["tests_recorded"], 3);
    assert!(
        report["view_url"]
            .as_str()
            .expect("view url")
            .starts_with("https://panel.example/reports/")
    );
}

#[tokio::test]
async fn test_identical_resubmission_is_skipped() {
    let h = TestHarness::new();
    let results = uniform_results(&["1", "2"], "Working");
    let body = submission_body(&h.tester_name, "abc1234", results);

    let (_, first) = h.post("/api/submit", &h.tester_key, body.clone()).await;
    assert_eq!(first["reports"][0]["action"], "created");

    let (status, second) = h.post("/api/submit", &h.tester_key, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["reports"][0]["action"], "skipped");
    assert_eq!(second["reports"][0]["revision"], 0);
}

#[tokio::test]
async fn test_status_drop_reports_a_regression() {
    let h = TestHarness::new();
    let good = submission_body(
        &h.tester_name,
        "abc1234",
        uniform_results(&["1", "2"], "Working"),
    );
    h.post("/api/submit", &h.tester_key, good).await;

    let mut worse = uniform_results(&["1", "2"], "Working");
    worse["2"] = json!({"status": "Not working", "notes": "login hangs"});
    let (status, response) = h
        .post(
            "/api/submit",
            &h.tester_key,
            submission_body(&h.tester_name, "def5678", worse),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let report = &response["reports"][0];
    assert_eq!(report["action"], "updated");
    assert_eq!(report["revision"], 1);
    assert_eq!(report["regressions"], json!(["2"]));
}

#[tokio::test]
async fn test_check_hash_agrees_with_submit() {
    let h = TestHarness::new();
    let results = uniform_results(&["1"], "Working");
    let local_hash = content_hash(&results, None);

    let check = json!({
        "hashes": { VERSION: local_hash.clone() },
        "test_type": "WAN",
    });

    let (status, before) = h.post("/api/check_hash", &h.tester_key, check.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["results"][VERSION]["exists"], false);
    assert_eq!(before["results"][VERSION]["action"], "create");

    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(&h.tester_name, "abc1234", results),
    )
    .await;

    let (_, after) = h.post("/api/check_hash", &h.tester_key, check).await;
    assert_eq!(after["results"][VERSION]["exists"], true);
    assert_eq!(after["results"][VERSION]["hash_matches"], true);
    assert_eq!(after["results"][VERSION]["action"], "skip");
    assert_eq!(after["results"][VERSION]["server_hash"], json!(local_hash));
}

#[tokio::test]
async fn test_attached_logs_survive_the_round_trip() {
    use base64::Engine;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let h = TestHarness::new();
    let plain = b"[2004-01-15 12:00:00] CM connect ok\n".repeat(40);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&plain).expect("compress");
    let compressed = encoder.finish().expect("finish");
    let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);

    let mut body = submission_body(
        &h.tester_name,
        "abc1234",
        uniform_results(&["1"], "Working"),
    );
    body["attached_logs"] = json!({
        VERSION: [{
            "filename": "emulator.log",
            "datetime": "2004-01-15 12:00:00",
            "size_original": plain.len(),
            "size_compressed": compressed.len(),
            "data": encoded,
        }],
    });

    let (status, response) = h.post("/api/submit", &h.tester_key, body).await;
    assert_eq!(status, StatusCode::CREATED);
    let report = &response["reports"][0];
    assert_eq!(report["logs_attached"], 1);
    let report_id = report["report_id"].as_i64().expect("id");

    let (_, listing) = h
        .get(&format!("/api/logs?report_id={report_id}"), &h.tester_key)
        .await;
    let logs = listing["logs"].as_array().expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["filename"], "emulator.log");
    let log_id = logs[0]["id"].as_i64().expect("log id");

    let (_, download) = h
        .get(&format!("/api/logs?log_id={log_id}"), &h.tester_key)
        .await;
    assert_eq!(download["log"]["data"], json!(encoded));
}

#[tokio::test]
async fn test_testers_only_see_their_own_reports() {
    let h = TestHarness::new();
    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(&h.tester_name, "abc1234", uniform_results(&["1"], "Working")),
    )
    .await;

    let other_key = {
        let code = h
            .store
            .create_invite(panel_store::users::Role::Tester, None)
            .expect("invite");
        let (_, key) = h.store.claim_invite(&code, "kay").expect("claim");
        key
    };

    let (_, own) = h.get("/api/reports", &h.tester_key).await;
    assert_eq!(own["reports"].as_array().expect("reports").len(), 1);

    let (_, other) = h.get("/api/reports", &other_key).await;
    assert!(other["reports"].as_array().expect("reports").is_empty());

    // Admins see everything and can filter by tester.
    let (_, all) = h.get("/api/reports", &h.admin_key).await;
    assert_eq!(all["reports"].as_array().expect("reports").len(), 1);
    let (_, filtered) = h.get("/api/reports?tester=kay", &h.admin_key).await;
    assert!(filtered["reports"].as_array().expect("reports").is_empty());
}

#[tokio::test]
async fn test_retest_queue_poll_and_complete() {
    let h = TestHarness::new();
    h.post(
        "/api/submit",
        &h.tester_key,
        submission_body(&h.tester_name, "abc1234", uniform_results(&["1"], "Working")),
    )
    .await;

    let (status, created) = h
        .post(
            "/api/admin/retests",
            &h.admin_key,
            json!({
                "type": "retest",
                "tester": h.tester_name,
                "test_key": "1",
                "client_version": VERSION,
                "reason": "please re-verify on the new build",
                "latest_revision": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let retest_id = created["retest_id"].as_i64().expect("id");

    // The poll shows the item until it is acknowledged.
    let (_, flags) = h.get("/api/flag_check", &h.tester_key).await;
    assert_eq!(flags["count"], 1);
    assert_eq!(flags["flags"][0]["test_key"], "1");

    let (status, _) = h
        .post(
            "/api/flag_check",
            &h.tester_key,
            json!({"type": "retest", "id": retest_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, flags) = h.get("/api/flag_check", &h.tester_key).await;
    assert_eq!(flags["count"], 0);

    // Acknowledged but still pending until completed.
    let (_, queue) = h.get("/api/retests", &h.tester_key).await;
    assert_eq!(queue["retest_queue"].as_array().expect("queue").len(), 1);

    let (status, _) = h
        .post(
            "/api/retests",
            &h.tester_key,
            json!({"type": "retest", "id": retest_id, "new_status": "Working"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, queue) = h.get("/api/retests", &h.tester_key).await;
    assert!(queue["retest_queue"].as_array().expect("queue").is_empty());

    // The request also left a notification for the tester.
    let (_, notes) = h.get("/api/notifications", &h.tester_key).await;
    assert!(notes["unread_count"].as_i64().expect("count") >= 1);
}

#[tokio::test]
async fn test_retest_completion_is_scoped_to_the_assignee() {
    let h = TestHarness::new();
    let (_, created) = h
        .post(
            "/api/admin/retests",
            &h.admin_key,
            json!({
                "type": "fixed",
                "tester": h.tester_name,
                "test_key": "1",
                "client_version": VERSION,
                "reason": "fix landed",
                "commit_hash": "def5678",
            }),
        )
        .await;
    let retest_id = created["retest_id"].as_i64().expect("id");

    // The admin is not the assignee, so completion 404s.
    let (status, _) = h
        .post(
            "/api/retests",
            &h.admin_key,
            json!({"type": "fixed", "id": retest_id}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
