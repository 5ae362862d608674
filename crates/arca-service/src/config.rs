//! Service configuration loaded from environment variables.
//!
//! Everything has a default, so an unset environment gives a working
//! configuration pointed at the platform data directory.

use std::path::PathBuf;
use std::time::Duration;

use arca_db::{DEFAULT_STORE_FILE, StoreLocator, StoreOptions};
use directories::ProjectDirs;

use crate::error::ConfigError;

pub const DEFAULT_KEYWORD_CAP: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Directory holding one sub-directory per user.
    /// Env: `ARCA_STORE_ROOT`
    pub store_root: PathBuf,

    /// Store file name inside each user directory.
    /// Env: `ARCA_STORE_FILE`
    /// Default: `messages.db`
    pub store_file_name: String,

    /// Most candidates the keyword filter reads before matching.
    /// Env: `ARCA_KEYWORD_CAP`
    /// Default: `10000`
    pub keyword_candidate_cap: u32,

    /// How long a read waits on a store the bridge is writing to.
    /// Env: `ARCA_BUSY_TIMEOUT_MS`
    /// Default: 5 seconds
    pub busy_timeout: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            store_file_name: DEFAULT_STORE_FILE.to_string(),
            keyword_candidate_cap: DEFAULT_KEYWORD_CAP,
            busy_timeout: StoreOptions::default().busy_timeout,
        }
    }
}

impl ArchiveConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(root) = get("ARCA_STORE_ROOT") {
            config.store_root = PathBuf::from(root);
        }

        if let Some(file) = get("ARCA_STORE_FILE") {
            config.store_file_name = file;
        }

        if let Some(cap) = get("ARCA_KEYWORD_CAP") {
            config.keyword_candidate_cap = match cap.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("ARCA_KEYWORD_CAP", cap)),
            };
        }

        if let Some(ms) = get("ARCA_BUSY_TIMEOUT_MS") {
            let parsed = ms
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid("ARCA_BUSY_TIMEOUT_MS", ms.clone()))?;
            config.busy_timeout = Duration::from_millis(parsed);
        }

        Ok(config)
    }

    pub fn locator(&self) -> StoreLocator {
        StoreLocator::new(&self.store_root).with_file_name(&self.store_file_name)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: self.busy_timeout,
        }
    }
}

fn invalid(var: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidValue { var, value }
}

fn default_store_root() -> PathBuf {
    ProjectDirs::from("com.br", "zesmoi", "arca")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from("./store"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_environment_gives_defaults() {
        let config = ArchiveConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store_file_name, "messages.db");
        assert_eq!(config.keyword_candidate_cap, 10_000);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(config.store_root.ends_with("store"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ArchiveConfig::from_lookup(lookup(&[
            ("ARCA_STORE_ROOT", "/srv/bridge/store"),
            ("ARCA_STORE_FILE", "archive.db"),
            ("ARCA_KEYWORD_CAP", "500"),
            ("ARCA_BUSY_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.keyword_candidate_cap, 500);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));

        let user = arca_core::UserId::new("alice").unwrap();
        assert_eq!(
            config.locator().path_for(&user),
            PathBuf::from("/srv/bridge/store/alice/archive.db")
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ArchiveConfig::from_lookup(lookup(&[("ARCA_KEYWORD_CAP", "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "ARCA_KEYWORD_CAP",
                value: "lots".into()
            }
        );

        assert!(ArchiveConfig::from_lookup(lookup(&[("ARCA_KEYWORD_CAP", "0")])).is_err());
        assert!(ArchiveConfig::from_lookup(lookup(&[("ARCA_BUSY_TIMEOUT_MS", "-1")])).is_err());
    }
}
