//! Client configuration file handling.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use panel_core::apikey::looks_like_api_key;

use crate::error::{Error, Result};

/// Default retest poll interval, in seconds.
pub const DEFAULT_CHECK_INTERVAL: u64 = 600;
/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Configuration for the panel client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Panel base URL, without a trailing slash.
    pub api_url: String,
    /// The tester's `sk_` API key.
    pub api_key: String,
    /// Seconds between background retest polls.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Whether the daemon polls for retests at all.
    #[serde(default = "default_true")]
    pub auto_check_retests: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

fn default_true() -> bool {
    true
}

/// Filenames checked by [`ClientConfig::discover`], in order.
pub const CONFIG_FILENAMES: &[&str] = &["test_panel_config.json", ".test_panel_config.json"];

impl ClientConfig {
    /// Look for a config file in the working directory, then the home
    /// directory.
    pub fn discover() -> Option<std::path::PathBuf> {
        for name in CONFIG_FILENAMES {
            let candidate = std::path::PathBuf::from(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        let home = std::env::var_os("HOME")?;
        for name in CONFIG_FILENAMES {
            let candidate = std::path::PathBuf::from(&home).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        let mut config: ClientConfig =
            serde_json::from_str(&raw).map_err(|e| Error::parse(e.to_string()))?;
        config.normalize();
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::config(errors.join("; ")));
        }
        Ok(config)
    }

    /// Write the config out as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw =
            serde_json::to_string_pretty(self).map_err(|e| Error::parse(e.to_string()))?;
        fs::write(path, raw).map_err(|e| Error::io(e, path))?;
        Ok(())
    }

    /// A template config with placeholder values for `create-config`.
    pub fn template() -> Self {
        Self {
            api_url: "https://your-panel.example.com".to_string(),
            api_key: "sk_YOUR_API_KEY_HERE".to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            auto_check_retests: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Strip the trailing slash so endpoint joins are uniform.
    pub fn normalize(&mut self) {
        while self.api_url.ends_with('/') {
            self.api_url.pop();
        }
    }

    /// Collect every configuration problem rather than stopping at the
    /// first, so the user can fix them in one pass.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.api_url.is_empty() {
            errors.push("api_url is required".to_string());
        }
        if self.api_key.is_empty() {
            errors.push("api_key is required".to_string());
        } else if !looks_like_api_key(&self.api_key) {
            errors.push("api_key should start with 'sk_'".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slashes() {
        let mut config = ClientConfig::template();
        config.api_url = "https://panel.example//".to_string();
        config.normalize();
        assert_eq!(config.api_url, "https://panel.example");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = ClientConfig {
            api_url: String::new(),
            api_key: "not-a-key".to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            auto_check_retests: true,
            timeout: DEFAULT_TIMEOUT,
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let mut config = ClientConfig::template();
        config.api_key = "sk_0123456789abcdef0123456789abcdef01234567".to_string();
        config.api_url = "https://panel.example".to_string();
        config.save(&path).expect("save");

        let loaded = ClientConfig::load(&path).expect("load");
        assert_eq!(loaded.api_url, config.api_url);
        assert_eq!(loaded.check_interval, DEFAULT_CHECK_INTERVAL);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "https://panel.example/", "api_key": "sk_0123456789abcdef0123456789abcdef01234567"}"#,
        )
        .expect("write");
        let config = ClientConfig::load(&path).expect("load");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.auto_check_retests);
        assert_eq!(config.api_url, "https://panel.example");
    }
}
