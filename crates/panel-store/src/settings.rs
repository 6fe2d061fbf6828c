//! Site settings key/value store.

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension, params};

use crate::error::Result;
use crate::store::Store;

impl Store {
    /// Read one setting.
    pub fn setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Read a setting and parse it as an integer, falling back to
    /// `default` when missing or malformed.
    pub fn setting_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .setting(key)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    /// Write one setting.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// All settings.
    pub fn all_settings(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overwrite() {
        let store = Store::open_in_memory().expect("open");
        assert_eq!(store.setting_i64("session_ttl_hours", 1).expect("ttl"), 72);
        store.set_setting("session_ttl_hours", "24").expect("set");
        assert_eq!(store.setting_i64("session_ttl_hours", 1).expect("ttl"), 24);
        assert!(store.setting("missing").expect("none").is_none());
        assert_eq!(store.setting_i64("site_name", 7).expect("fallback"), 7);
    }
}
