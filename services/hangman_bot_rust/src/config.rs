//! Bot configuration.
//!
//! Read from an optional TOML settings file first, then overridden by
//! environment variables (a `.env` file is loaded by `main` before this runs).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use hangman_rust_core::clients::telegram::DEFAULT_API_BASE_URL;
use hangman_rust_core::models::UserId;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot token
    #[serde(alias = "Apikey")]
    pub apikey: String,
    /// Users allowed to run admin commands
    #[serde(alias = "Admins")]
    pub admins: Vec<UserId>,
    /// Newline separated word list
    #[serde(alias = "Dict")]
    pub dict: PathBuf,

    pub snapshot_path: PathBuf,
    pub snapshot_interval_secs: u64,

    pub sender_workers: usize,
    pub queue_capacity: usize,

    pub poll_timeout_secs: u64,
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apikey: String::new(),
            admins: Vec::new(),
            dict: PathBuf::from("words.txt"),
            snapshot_path: PathBuf::from("data.json"),
            snapshot_interval_secs: 60,
            sender_workers: 3,
            queue_capacity: 128,
            poll_timeout_secs: 300,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load settings from `path` (skipped when the file does not exist),
    /// apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            Self::from_toml_str(&raw)
                .with_context(|| format!("Invalid settings file {}", path.display()))?
        } else {
            info!("No settings file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var("TELEGRAM_API_KEY") {
            self.apikey = v;
        }
        if let Ok(v) = env::var("TELEGRAM_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Ok(raw) = env::var("HANGMAN_ADMINS") {
            self.admins = parse_admins(&raw).context("HANGMAN_ADMINS")?;
        }
        if let Ok(v) = env::var("HANGMAN_DICT") {
            self.dict = PathBuf::from(v);
        }
        if let Ok(v) = env::var("HANGMAN_SNAPSHOT_PATH") {
            self.snapshot_path = PathBuf::from(v);
        }

        self.snapshot_interval_secs =
            parse_env("HANGMAN_SNAPSHOT_INTERVAL_SECS", self.snapshot_interval_secs)?;
        self.sender_workers = parse_env("HANGMAN_SENDER_WORKERS", self.sender_workers)?;
        self.queue_capacity = parse_env("HANGMAN_QUEUE_CAPACITY", self.queue_capacity)?;
        self.poll_timeout_secs = parse_env("HANGMAN_POLL_TIMEOUT_SECS", self.poll_timeout_secs)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.apikey.trim().is_empty() {
            return Err(anyhow!(
                "Telegram API key must be set (apikey in settings or TELEGRAM_API_KEY)"
            ));
        }
        if self.sender_workers == 0 {
            return Err(anyhow!("sender_workers must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be at least 1"));
        }
        if self.snapshot_interval_secs == 0 {
            return Err(anyhow!("snapshot_interval_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Log current configuration (the API key is never printed)
    pub fn log_config(&self) {
        info!("Config loaded:");
        info!("  admins: {:?}", self.admins);
        info!("  dict: {}", self.dict.display());
        info!("  snapshot_path: {}", self.snapshot_path.display());
        info!("  snapshot_interval: {}s", self.snapshot_interval_secs);
        info!("  sender_workers: {}", self.sender_workers);
        info!("  queue_capacity: {}", self.queue_capacity);
        info!("  poll_timeout: {}s", self.poll_timeout_secs);
        info!("  api_base_url: {}", self.api_base_url);
    }
}

fn parse_admins(raw: &str) -> Result<Vec<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UserId>()
                .with_context(|| format!("Invalid admin id: {s} (expected integer)"))
        })
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sender_workers, 3);
        assert_eq!(config.queue_capacity, 128);
        assert_eq!(config.poll_timeout_secs, 300);
        assert_eq!(config.snapshot_path, PathBuf::from("data.json"));
        assert!(config.validate().is_err()); // no API key
    }

    #[test]
    fn test_legacy_settings_keys() {
        let config = Config::from_toml_str(
            r#"
            Apikey = "123:abc"
            Admins = [1, 2]
            Dict = "/usr/share/dict/nl.txt"
            "#,
        )
        .unwrap();
        assert_eq!(config.apikey, "123:abc");
        assert_eq!(config.admins, vec![1, 2]);
        assert_eq!(config.dict, PathBuf::from("/usr/share/dict/nl.txt"));
        assert_eq!(config.sender_workers, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_settings() {
        let config = Config::from_toml_str(
            r#"
            apikey = "t"
            admins = [42]
            dict = "words.txt"
            snapshot_path = "/var/lib/hangman/data.json"
            snapshot_interval_secs = 30
            sender_workers = 5
            queue_capacity = 16
            poll_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.sender_workers, 5);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.snapshot_interval(), Duration::from_secs(30));
        assert_eq!(config.poll_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = Config {
            apikey: "t".to_string(),
            sender_workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            apikey: "t".to_string(),
            queue_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_admins() {
        assert_eq!(parse_admins("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_admins("1,abc").is_err());
        assert!(parse_admins("").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file_needs_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        // Only fails on the key if the environment does not provide one.
        if env::var("TELEGRAM_API_KEY").is_err() {
            assert!(Config::load(&path).is_err());
        }
    }
}
