//! Schema migrations and the seeded test battery.
//!
//! Migrations are forward-only and tracked through `PRAGMA user_version`.
//! A fresh database gets the full schema plus the canonical battery the
//! tool falls back to when the panel is unreachable, so a new panel serves
//! the same test list the tool already knows.

use rusqlite::Connection;

use crate::error::Result;

/// Schema version written after the last migration.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all outstanding migrations on `conn`.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        seed_battery(conn)?;
        seed_settings(conn)?;
        conn.pragma_update(None, "user_version", 1)?;
        log::info!("migrated panel database to schema v1");
    }

    Ok(())
}

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    role            TEXT NOT NULL DEFAULT 'tester',
    api_key_digest  TEXT NOT NULL UNIQUE,
    is_enabled      INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token       TEXT PRIMARY KEY,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invites (
    code        TEXT PRIMARY KEY,
    role        TEXT NOT NULL DEFAULT 'tester',
    created_by  TEXT,
    created_at  TEXT NOT NULL,
    claimed_by  INTEGER REFERENCES users(id),
    claimed_at  TEXT
);

CREATE TABLE IF NOT EXISTS categories (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    sort_order  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tests (
    test_key    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    sort_order  INTEGER NOT NULL DEFAULT 0,
    is_enabled  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS versions (
    id           TEXT PRIMARY KEY,
    display_name TEXT,
    packages     TEXT NOT NULL DEFAULT '[]',
    steam_date   TEXT,
    steam_time   TEXT,
    skip_tests   TEXT NOT NULL DEFAULT '[]',
    sort_order   INTEGER NOT NULL DEFAULT 0,
    is_enabled   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS version_notices (
    id          INTEGER PRIMARY KEY,
    version_id  TEXT NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    message     TEXT NOT NULL,
    commit_hash TEXT,
    created_at  TEXT NOT NULL,
    created_by  TEXT
);

CREATE TABLE IF NOT EXISTS version_tests (
    version_id  TEXT NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    test_key    TEXT NOT NULL REFERENCES tests(test_key) ON DELETE CASCADE,
    PRIMARY KEY (version_id, test_key)
);

CREATE TABLE IF NOT EXISTS reports (
    id             INTEGER PRIMARY KEY,
    tester         TEXT NOT NULL,
    client_version TEXT NOT NULL,
    test_type      TEXT NOT NULL,
    commit_hash    TEXT,
    content_hash   TEXT NOT NULL,
    results        TEXT NOT NULL,
    revision       INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (tester, client_version, test_type)
);

CREATE TABLE IF NOT EXISTS report_revisions (
    id           INTEGER PRIMARY KEY,
    report_id    INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
    revision     INTEGER NOT NULL,
    commit_hash  TEXT,
    content_hash TEXT NOT NULL,
    results      TEXT NOT NULL,
    diff         TEXT NOT NULL,
    archived_at  TEXT NOT NULL,
    UNIQUE (report_id, revision)
);

CREATE TABLE IF NOT EXISTS report_logs (
    id              INTEGER PRIMARY KEY,
    report_id       INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
    filename        TEXT NOT NULL,
    log_datetime    TEXT NOT NULL DEFAULT '',
    size_original   INTEGER NOT NULL,
    size_compressed INTEGER NOT NULL,
    data            BLOB NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS retest_queue (
    id                 INTEGER PRIMARY KEY,
    kind               TEXT NOT NULL,
    tester             TEXT NOT NULL,
    test_key           TEXT NOT NULL,
    client_version     TEXT NOT NULL,
    reason             TEXT NOT NULL DEFAULT '',
    notes              TEXT,
    latest_revision    INTEGER NOT NULL DEFAULT 0,
    commit_hash        TEXT,
    report_id          INTEGER,
    report_revision    INTEGER,
    tested_commit_hash TEXT,
    new_status         TEXT,
    completed_at       TEXT,
    acknowledged_at    TEXT,
    created_at         TEXT NOT NULL,
    created_by         TEXT
);

CREATE TABLE IF NOT EXISTS regression_flags (
    id          INTEGER PRIMARY KEY,
    report_id   INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
    revision    INTEGER NOT NULL,
    test_key    TEXT NOT NULL,
    from_status TEXT NOT NULL,
    to_status   TEXT NOT NULL,
    reviewed_at TEXT,
    reviewed_by TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id             INTEGER PRIMARY KEY,
    user_id        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind           TEXT NOT NULL,
    report_id      INTEGER,
    test_key       TEXT,
    client_version TEXT,
    title          TEXT NOT NULL,
    message        TEXT NOT NULL,
    notes          TEXT,
    is_read        INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    read_at        TEXT
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_version ON reports (client_version);
CREATE INDEX IF NOT EXISTS idx_reports_tester ON reports (tester);
CREATE INDEX IF NOT EXISTS idx_revisions_report ON report_revisions (report_id);
CREATE INDEX IF NOT EXISTS idx_logs_report ON report_logs (report_id);
CREATE INDEX IF NOT EXISTS idx_retests_tester ON retest_queue (tester, completed_at);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, is_read);
"#;

/// Seeded categories, in battery order.
const CATEGORIES: &[&str] = &[
    "Setup & Login",
    "Account Management",
    "Games & Store",
    "Server Browser",
    "Account Recovery",
    "Tracker Friends",
    "CM Friends",
];

/// The canonical battery: (test_key, category, name, description).
///
/// Matches the tool's built-in fallback list so a fresh panel and an
/// offline tool agree on the battery.
const BATTERY: &[(&str, &str, &str, &str)] = &[
    ("1", "Setup & Login", "Run the Steam.exe", "Client downloads, updates and presents the Welcome window"),
    ("2", "Setup & Login", "Create a new account", "Account is created and automatically logged into, no errors in the Steam client logs. Email is sent if SMTP is enabled"),
    ("2a", "Setup & Login", "Steam Subscriber Agreement displayed", "The SSA is shown during account creation"),
    ("2b", "Setup & Login", "Choose unique account name", "Wizard proceeds to the email address page"),
    ("2c", "Setup & Login", "Choose in-use account name", "Wizard shows alternative account names"),
    ("2d", "Setup & Login", "Enter a unique email address", "Wizard proceeds to security question"),
    ("2e", "Setup & Login", "Enter an existing email address", "Wizard prompts to find an existing account"),
    ("2f", "Setup & Login", "Steam account information is displayed", "Information is correct and all images displayed"),
    ("3", "Setup & Login", "Log into an existing account", "Client logs in and the main window is displayed"),
    ("4", "Setup & Login", "Log into an existing account made in an earlier client version", "Client logs in and the main window is displayed"),
    ("5", "Account Management", "Change password", "Client will only change password with correct information. Email is sent if SMTP is enabled"),
    ("6", "Account Management", "Change secret question answer", "Client will only change secret answer with correct information. Email is sent if SMTP is enabled"),
    ("7", "Account Management", "Change email address", "Email address on account is changed. Email is sent if SMTP is enabled"),
    ("8", "Games & Store", "Add a non-Steam game", "Game shortcut is displayed in the My Games window"),
    ("9", "Games & Store", "Purchase a game via Credit Card", "Purchase wizard shows and completes the transaction. My Games list updates with the added game(s). Check login still works"),
    ("10", "Games & Store", "Activate a product on Steam", "CD-Key activation wizard shows and adds the game(s) to the My Games list. Check login still works"),
    ("11", "Games & Store", "Download a game", "Game downloads and displays as installed in the My Games list"),
    ("12a", "Server Browser", "GoldSrc Steam server browser", "Steam server browser shows running GoldSrc multiplayer games and/or HLTV sessions"),
    ("12b", "Server Browser", "GoldSrc in-game server browser", "In-game server browser shows running GoldSrc multiplayer games"),
    ("12c", "Server Browser", "GoldSrc Steam ticket validation", "GoldSrc server validates Steam ticket successfully"),
    ("12d", "Server Browser", "Source Steam server browser", "Steam server browser shows running Source multiplayer games and/or HLTV sessions"),
    ("12e", "Server Browser", "Source in-game server browser", "In-game server browser shows running Source multiplayer games"),
    ("12f", "Server Browser", "Source Steam ticket validation", "Source server validates Steam ticket successfully"),
    ("13", "Account Management", "Account retrieval", "Account can be accessed via several methods"),
    ("14a", "Account Recovery", "Forgot password using email", "Email is sent if SMTP is enabled; this requires the correct validation code. Non-SMTP should accept any code"),
    ("14b", "Account Recovery", "Forgot password using CD key", "Password is reset when provided with a CD key registered on the account"),
    ("14c", "Account Recovery", "Forgot password using secret question", "Password is reset when provided with the correct secret question answer"),
    ("15", "Games & Store", "Add a subscription", "Subscription list updates and game appears in My Games"),
    ("16", "Games & Store", "Remove a subscription", "The My Games list is updated with the removal of the game(s)"),
    ("17", "Account Management", "Delete user", "The user is removed from the server"),
    ("18", "Tracker Friends", "Tracker Friends - Login", "Tracker Friends service accepts login and displays friends list"),
    ("19", "Tracker Friends", "Tracker Friends - Add Friend", "Friend is added and appears in friends list"),
    ("20", "Tracker Friends", "Tracker Friends - Chat", "Chat messages can be sent and received between friends"),
    ("21", "Tracker Friends", "Tracker Friends - Change Status", "User status is updated for all users"),
    ("22", "Tracker Friends", "Tracker Friends - Play Minigame", "Minigame launches and can be played with friends"),
    ("23", "Tracker Friends", "Tracker Friends - Remove Friend", "Friend is removed from friends list"),
    ("24", "CM Friends", "CM Friends - Login", "CM Friends service accepts login and displays friends list"),
    ("25", "CM Friends", "CM Friends - Add Friend", "Friend is added and appears in friends list"),
    ("26", "CM Friends", "CM Friends - Chat", "Chat messages can be sent and received between friends"),
    ("27", "CM Friends", "CM Friends - Change Status", "User status is updated for all users"),
    ("28", "CM Friends", "CM Friends - Remove Friend", "Friend is removed from friends list"),
];

fn seed_battery(conn: &Connection) -> Result<()> {
    for (order, name) in CATEGORIES.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO categories (name, sort_order) VALUES (?1, ?2)",
            rusqlite::params![name, order as i64],
        )?;
    }

    for (order, (key, category, name, description)) in BATTERY.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO tests (test_key, name, description, category_id, sort_order)
             VALUES (?1, ?2, ?3, (SELECT id FROM categories WHERE name = ?4), ?5)",
            rusqlite::params![key, name, description, category, order as i64],
        )?;
    }

    Ok(())
}

fn seed_settings(conn: &Connection) -> Result<()> {
    const DEFAULTS: &[(&str, &str)] = &[
        ("site_name", "Steam Emulator Test Panel"),
        ("session_ttl_hours", "72"),
        ("retest_check_interval", "600"),
    ];
    for (key, value) in DEFAULTS {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
    }
    Ok(())
}
