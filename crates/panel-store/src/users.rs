//! Users, API keys, sessions, and invites.
//!
//! There are no passwords. An invite code mints a user together with an
//! `sk_` API key; only the key's SHA-256 digest is stored, so the plaintext
//! is handed out exactly once. Browser-style sessions are opaque tokens a
//! user exchanges a valid key for.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use panel_core::apikey;

use crate::error::{Error, Result};
use crate::store::{Store, now};

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits reports, works the retest queue.
    Tester,
    /// Everything a tester can, plus panel administration.
    Admin,
}

impl Role {
    /// Wire/database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tester => "tester",
            Role::Admin => "admin",
        }
    }

    /// Parse the stored string; unknown roles degrade to tester.
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Tester,
        }
    }
}

/// A panel user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Database id.
    pub id: i64,
    /// Unique display name; also the `tester` field on reports.
    pub username: String,
    /// Role.
    pub role: Role,
    /// Disabled users keep their history but cannot authenticate.
    pub is_enabled: bool,
    /// When the account was created.
    pub created_at: String,
}

impl User {
    /// Returns `true` for admins.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// An opaque session token with its owner.
#[derive(Debug, Clone)]
pub struct Session {
    /// The token handed to the client.
    pub token: String,
    /// Owning user.
    pub user_id: i64,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        role: Role::parse(&row.get::<_, String>("role")?),
        is_enabled: row.get("is_enabled")?,
        created_at: row.get("created_at")?,
    })
}

impl Store {
    /// Create an invite code an admin hands to a new tester.
    pub fn create_invite(&self, role: Role, created_by: Option<&str>) -> Result<String> {
        let code = Uuid::new_v4().simple().to_string();
        self.conn().execute(
            "INSERT INTO invites (code, role, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![code, role.as_str(), created_by, now()],
        )?;
        Ok(code)
    }

    /// Claim an invite: creates the user and returns the plaintext API key.
    ///
    /// The key is not stored; callers must show it to the user immediately.
    pub fn claim_invite(&self, code: &str, username: &str) -> Result<(User, String)> {
        let username = username.trim();
        if username.is_empty() {
            return Err(panel_core::Error::validation_field("username", "must not be empty").into());
        }

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let role: String = tx
            .query_row(
                "SELECT role FROM invites WHERE code = ?1 AND claimed_by IS NULL",
                params![code],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::InvalidInvite(code.to_string()))?;

        let key = apikey::generate_api_key();
        let digest = apikey::api_key_digest(&key);
        let created = now();

        tx.execute(
            "INSERT INTO users (username, role, api_key_digest, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, role, digest, created],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Conflict(format!("username '{username}' is taken"))
            }
            other => Error::Sqlite(other),
        })?;
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE invites SET claimed_by = ?1, claimed_at = ?2 WHERE code = ?3",
            params![user_id, created, code],
        )?;
        tx.commit()?;

        log::info!("invite claimed: user '{username}' created as {role}");
        Ok((
            User {
                id: user_id,
                username: username.to_string(),
                role: Role::parse(&role),
                is_enabled: true,
                created_at: created,
            },
            key,
        ))
    }

    /// Look up the enabled user owning an API key.
    pub fn user_by_api_key(&self, key: &str) -> Result<Option<User>> {
        if !apikey::looks_like_api_key(key) {
            return Ok(None);
        }
        let digest = apikey::api_key_digest(key);
        Ok(self
            .conn()
            .query_row(
                "SELECT id, username, role, is_enabled, created_at FROM users
                 WHERE api_key_digest = ?1 AND is_enabled = 1",
                params![digest],
                row_to_user,
            )
            .optional()?)
    }

    /// Fetch a user by id.
    pub fn user_by_id(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, role, is_enabled, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("user", id.to_string()))
    }

    /// Fetch a user by username.
    pub fn user_by_name(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, username, role, is_enabled, created_at FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?)
    }

    /// All users, admins first then by name.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, role, is_enabled, created_at FROM users
             ORDER BY role = 'admin' DESC, username",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Enable or disable a user. Disabling also drops their sessions.
    pub fn set_user_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE users SET is_enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("user", id.to_string()));
        }
        if !enabled {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        }
        Ok(())
    }

    /// Replace a user's API key, returning the new plaintext.
    pub fn rotate_api_key(&self, id: i64) -> Result<String> {
        let key = apikey::generate_api_key();
        let digest = apikey::api_key_digest(&key);
        let changed = self.conn().execute(
            "UPDATE users SET api_key_digest = ?1 WHERE id = ?2",
            params![digest, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("user", id.to_string()));
        }
        Ok(key)
    }

    /// Mint a session token for `user_id`, valid for `ttl_hours`.
    pub fn create_session(&self, user_id: i64, ttl_hours: i64) -> Result<Session> {
        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let created = Utc::now();
        let expires = created + Duration::hours(ttl_hours);
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, created.to_rfc3339(), expires.to_rfc3339()],
        )?;
        Ok(Session {
            token,
            user_id,
            expires_at: expires,
        })
    }

    /// Resolve a session token to its (enabled) user, expiring lazily.
    pub fn user_by_session(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) < Utc::now())
            .unwrap_or(true);
        if expired {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            return Ok(None);
        }
        drop(conn);
        match self.user_by_id(user_id) {
            Ok(user) if user.is_enabled => Ok(Some(user)),
            Ok(_) | Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Drop a session token (logout).
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }
}
