//! Integration tests for the submission lifecycle.

use serde_json::json;

use panel_core::content_hash;
use panel_store::{ReportFilter, SubmitAction};

use crate::common::{TestHarness, VERSION, submission, uniform_results};

#[test]
fn test_full_session_lifecycle() {
    let harness = TestHarness::new();
    let store = &harness.store;

    // First battery run.
    let first = store
        .submit_session(
            "alice",
            &submission("alice", "abc1234", uniform_results(&["1", "2", "3"], "Working")),
        )
        .expect("first submission");
    assert_eq!(first[0].action, SubmitAction::Created);
    assert_eq!(first[0].tests_recorded, 3);

    // The tool checks the hash before resubmitting an unchanged session.
    let payload = uniform_results(&["1", "2", "3"], "Working");
    let checks = store
        .check_hashes(
            "alice",
            "WAN",
            &[(VERSION.to_string(), content_hash(&payload, None))],
        )
        .expect("precheck");
    assert_eq!(checks[0].action, "skip");
    assert!(checks[0].hash_matches);

    // A changed session archives the old payload.
    let mut changed = uniform_results(&["1", "2", "3"], "Working");
    changed["2"] = json!({"status": "Semi-working", "notes": "wizard hangs once"});
    let second = store
        .submit_session("alice", &submission("alice", "def5678", changed))
        .expect("second submission");
    assert_eq!(second[0].action, SubmitAction::Updated);
    assert_eq!(second[0].revision, 1);
    assert!(second[0].regressions.iter().any(|r| r.test_key == "2"));

    let revisions = store
        .report_revisions(second[0].report_id)
        .expect("revisions");
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].results["2"]["status"], "Working");
    assert!(revisions[0].diff.has_regressions());

    // The regression landed in the admin review queue.
    let flags = store.unreviewed_regressions().expect("flags");
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].test_key, "2");
    assert_eq!(flags[0].revision, 1);
}

#[test]
fn test_testers_do_not_share_reports() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let payload = uniform_results(&["1"], "Working");

    store
        .submit_session("alice", &submission("alice", "abc", payload.clone()))
        .expect("alice");
    store
        .submit_session("bob", &submission("bob", "abc", payload.clone()))
        .expect("bob");

    // Bob's precheck must not see Alice's hash.
    let checks = store
        .check_hashes(
            "carol",
            "WAN",
            &[(VERSION.to_string(), content_hash(&payload, None))],
        )
        .expect("precheck");
    assert_eq!(checks[0].action, "create");

    let all = store.list_reports(&ReportFilter::default()).expect("all");
    assert_eq!(all.len(), 2);
}

#[test]
fn test_revision_history_accumulates_in_order() {
    let harness = TestHarness::new();
    let store = &harness.store;

    for (i, status) in ["Working", "Semi-working", "Not working"].iter().enumerate() {
        let outcome = store
            .submit_session(
                "alice",
                &submission("alice", &format!("commit{i}"), uniform_results(&["9"], status)),
            )
            .expect("submission");
        assert_eq!(outcome[0].revision, i as i64);
    }

    let report = store
        .list_reports(&ReportFilter::default())
        .expect("reports")
        .remove(0);
    let revisions = store.report_revisions(report.id).expect("revisions");
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].revision, 0);
    assert_eq!(revisions[0].results["9"]["status"], "Working");
    assert_eq!(revisions[1].revision, 1);
    assert_eq!(revisions[1].results["9"]["status"], "Semi-working");
    assert_eq!(report.revision, 2);
    assert_eq!(report.commit_hash.as_deref(), Some("commit2"));
}

#[test]
fn test_hash_precheck_agrees_with_submission_skip() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let payload = json!({
        "14a": {"status": "N/A", "notes": "no SMTP on this rig"},
        "14b": {"status": "Working", "notes": ""},
    });

    store
        .submit_session("alice", &submission("alice", "abc", payload.clone()))
        .expect("submit");

    // The client computes the hash locally; a matching precheck and an
    // actual resubmission must agree.
    let local_hash = content_hash(&payload, None);
    let checks = store
        .check_hashes("alice", "WAN", &[(VERSION.to_string(), local_hash)])
        .expect("precheck");
    assert_eq!(checks[0].action, "skip");

    let outcome = store
        .submit_session("alice", &submission("alice", "abc", payload))
        .expect("resubmit");
    assert_eq!(outcome[0].action, SubmitAction::Skipped);
}
