//! Integration tests for the retest and notification loop.

use panel_core::retest::RetestKind;
use panel_store::RetestRequest;

use crate::common::{TestHarness, VERSION, submission, uniform_results};

fn fixed_request(tester: &str, test_key: &str, report_id: Option<i64>) -> RetestRequest {
    RetestRequest {
        kind: RetestKind::Fixed,
        tester: tester.to_string(),
        test_key: test_key.to_string(),
        client_version: VERSION.to_string(),
        reason: "CM chat fix landed".to_string(),
        latest_revision: true,
        commit_hash: Some("fix9999".to_string()),
        notes: Some("rebuild before testing".to_string()),
        report_id,
        created_by: Some("admin".to_string()),
    }
}

#[test]
fn test_admin_requests_tester_confirms() {
    let harness = TestHarness::new();
    let store = &harness.store;
    harness.mint_tester("alice");

    // Alice reported CM chat broken.
    let outcome = store
        .submit_session(
            "alice",
            &submission("alice", "abc1234", uniform_results(&["26"], "Not working")),
        )
        .expect("report");
    let report_id = outcome[0].report_id;

    // Admin files a fix confirmation against that report.
    let item_id = store
        .request_retest(&fixed_request("alice", "26", Some(report_id)))
        .expect("request");

    // The daemon poll sees it; the item pins the reported revision.
    let unseen = store.unacknowledged_retests("alice").expect("poll");
    assert_eq!(unseen.len(), 1);
    assert_eq!(unseen[0].id, item_id);
    assert_eq!(unseen[0].kind, RetestKind::Fixed);
    assert_eq!(unseen[0].report_revision, Some(0));
    assert_eq!(unseen[0].tested_commit_hash.as_deref(), Some("abc1234"));
    assert_eq!(unseen[0].test_name, "CM Friends - Chat");

    // Alice also got an in-panel notification.
    let alice = store.user_by_name("alice").expect("lookup").expect("user");
    assert_eq!(store.unread_notification_count(alice.id).expect("count"), 1);

    // Tool acks the batch, Alice retests and confirms the fix.
    store
        .acknowledge_retests("alice", &[item_id])
        .expect("ack");
    store
        .complete_retest(item_id, "alice", Some("Working"))
        .expect("complete");

    assert!(store.pending_retests("alice").expect("pending").is_empty());
    assert!(store.unacknowledged_retests("alice").expect("poll").is_empty());
}

#[test]
fn test_queue_is_per_tester() {
    let harness = TestHarness::new();
    let store = &harness.store;

    store
        .request_retest(&fixed_request("alice", "26", None))
        .expect("alice item");

    assert_eq!(store.pending_retests("alice").expect("alice").len(), 1);
    assert!(store.pending_retests("bob").expect("bob").is_empty());
}

#[test]
fn test_regression_review_after_update() {
    let harness = TestHarness::new();
    let store = &harness.store;

    store
        .submit_session(
            "alice",
            &submission("alice", "abc", uniform_results(&["18"], "Working")),
        )
        .expect("first");
    store
        .submit_session(
            "alice",
            &submission("alice", "def", uniform_results(&["18"], "Not working")),
        )
        .expect("regressing update");

    let flags = store.unreviewed_regressions().expect("flags");
    assert_eq!(flags.len(), 1);

    store
        .review_regression(flags[0].id, "admin")
        .expect("review");
    assert!(store.unreviewed_regressions().expect("cleared").is_empty());

    // Reviewing once is final.
    assert!(store.review_regression(flags[0].id, "admin").is_err());
}
