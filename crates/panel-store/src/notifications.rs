//! Per-user notifications.

use chrono::{DateTime, Utc};
use rusqlite::params;

use panel_core::notification::{Notification, NotificationKind};

use crate::error::{Error, Result};
use crate::store::{Store, now};

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get("kind")?;
    let created: String = row.get("created_at")?;
    let read_at: Option<String> = row.get("read_at")?;
    Ok(Notification {
        id: row.get("id")?,
        kind: NotificationKind::parse(&kind),
        report_id: row.get("report_id")?,
        test_key: row.get("test_key")?,
        client_version: row.get("client_version")?,
        title: row.get("title")?,
        message: row.get("message")?,
        notes: row.get("notes")?,
        is_read: row.get("is_read")?,
        created_at: parse_time(&created),
        read_at: read_at.as_deref().map(parse_time),
    })
}

impl Store {
    /// Deliver a notification to one user, returning its id.
    #[allow(clippy::too_many_arguments)]
    pub fn push_notification(
        &self,
        user_id: i64,
        kind: NotificationKind,
        title: &str,
        message: &str,
        report_id: Option<i64>,
        test_key: Option<&str>,
        client_version: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO notifications
               (user_id, kind, report_id, test_key, client_version, title, message, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user_id,
                kind.as_str(),
                report_id,
                test_key,
                client_version,
                title,
                message,
                notes,
                now()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Notifications for a user, newest first. `unread_only` filters out
    /// everything already read.
    pub fn notifications_for(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT id, kind, report_id, test_key, client_version, title, message, notes,
                    is_read, created_at, read_at
             FROM notifications WHERE user_id = ?1 {}
             ORDER BY created_at DESC, id DESC",
            if unread_only { "AND is_read = 0" } else { "" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Unread notification count for a user.
    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    /// Mark one of the user's notifications read.
    pub fn mark_notification_read(&self, user_id: i64, id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND is_read = 0",
            params![now(), id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("notification", id.to_string()));
        }
        Ok(())
    }

    /// Mark everything read for a user; returns how many changed.
    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize> {
        Ok(self.conn().execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE user_id = ?2 AND is_read = 0",
            params![now(), user_id],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;

    fn store_with_user() -> (Store, i64) {
        let store = Store::open_in_memory().expect("open");
        let code = store.create_invite(Role::Tester, None).expect("invite");
        let (user, _) = store.claim_invite(&code, "alice").expect("user");
        (store, user.id)
    }

    #[test]
    fn test_push_and_read_flow() {
        let (store, user_id) = store_with_user();
        let id = store
            .push_notification(
                user_id,
                NotificationKind::Fixed,
                "Fix ready to verify",
                "Server browser fix landed",
                None,
                Some("12a"),
                Some("secondblob.bin.2004-01-15"),
                None,
            )
            .expect("push");

        assert_eq!(store.unread_notification_count(user_id).expect("count"), 1);
        store.mark_notification_read(user_id, id).expect("read");
        assert_eq!(store.unread_notification_count(user_id).expect("count"), 0);

        let all = store.notifications_for(user_id, false).expect("all");
        assert_eq!(all.len(), 1);
        assert!(all[0].is_read);
        assert!(all[0].read_at.is_some());
    }

    #[test]
    fn test_mark_read_is_scoped_to_owner() {
        let (store, user_id) = store_with_user();
        let code = store.create_invite(Role::Tester, None).expect("invite");
        let (other, _) = store.claim_invite(&code, "bob").expect("user");

        let id = store
            .push_notification(
                user_id,
                NotificationKind::Info,
                "Welcome",
                "Battery updated",
                None,
                None,
                None,
                None,
            )
            .expect("push");
        assert!(store.mark_notification_read(other.id, id).is_err());
    }

    #[test]
    fn test_mark_all_read() {
        let (store, user_id) = store_with_user();
        for i in 0..3 {
            store
                .push_notification(
                    user_id,
                    NotificationKind::Info,
                    &format!("n{i}"),
                    "m",
                    None,
                    None,
                    None,
                    None,
                )
                .expect("push");
        }
        assert_eq!(store.mark_all_notifications_read(user_id).expect("all"), 3);
        assert!(store.notifications_for(user_id, true).expect("unread").is_empty());
    }
}
