//! Common test utilities for the panel store integration tests.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use panel_core::version::ClientVersion;
use panel_core::{SessionSubmission, SubmissionMeta};
use panel_store::Store;
use panel_store::users::Role;

/// The version id every harness seeds.
pub const VERSION: &str = "secondblob.bin.2004-01-15";

/// Test harness: an in-memory store with one registered version.
pub struct TestHarness {
    /// The store under test.
    pub store: Store,
}

impl TestHarness {
    /// Creates a harness with the default seeded version.
    pub fn new() -> Self {
        let store = Store::open_in_memory().expect("in-memory store");
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
        Self { store }
    }

    /// Mints a tester via the invite flow, returning (username, api key).
    pub fn mint_tester(&self, name: &str) -> String {
        let code = self
            .store
            .create_invite(Role::Tester, Some("admin"))
            .expect("invite");
        let (_, key) = self.store.claim_invite(code.as_str(), name).expect("claim");
        key
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A WAN submission for the seeded version with the given raw results.
pub fn submission(tester: &str, commit: &str, results: Value) -> SessionSubmission {
    SessionSubmission {
        meta: SubmissionMeta {
            tester: tester.to_string(),
            commit: commit.to_string(),
            wan: true,
            lan: false,
            emulator_path: Some("C:/steamemu".to_string()),
        },
        results: BTreeMap::from([(VERSION.to_string(), results)]),
        attached_logs: BTreeMap::new(),
        version_packages: None,
    }
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
