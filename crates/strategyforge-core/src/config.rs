//! Application configuration management.
//!
//! Configuration is read from `~/.config/strategyforge/config.json` when it
//! exists and then overridden by `STRATEGYFORGE_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::api::RefreshPolicy;
use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "strategyforge";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

/// Transport timeout applied to every request, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const ENV_API_URL: &str = "STRATEGYFORGE_API_URL";
pub const ENV_API_TIMEOUT: &str = "STRATEGYFORGE_API_TIMEOUT";
pub const ENV_STORAGE: &str = "STRATEGYFORGE_STORAGE";
pub const ENV_REFRESH_POLICY: &str = "STRATEGYFORGE_REFRESH_POLICY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the session is persisted between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(StorageBackend::File),
            "keyring" | "keychain" => Some(StorageBackend::Keyring),
            "memory" | "none" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub timeout_ms: u64,
    pub storage: StorageBackend,
    pub refresh_policy: RefreshPolicy,
    /// Overrides the platform data directory for file storage
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            storage: StorageBackend::default(),
            refresh_policy: RefreshPolicy::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_API_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => {
                    warn!(value = %raw, "Ignoring invalid API timeout, using default");
                    self.timeout_ms = DEFAULT_TIMEOUT_MS;
                }
            }
        }
        if let Some(raw) = lookup(ENV_STORAGE) {
            match StorageBackend::parse(&raw) {
                Some(storage) => self.storage = storage,
                None => warn!(value = %raw, "Ignoring unknown storage backend"),
            }
        }
        if let Some(raw) = lookup(ENV_REFRESH_POLICY) {
            match RefreshPolicy::parse(&raw) {
                Some(policy) => self.refresh_policy = policy,
                None => warn!(value = %raw, "Ignoring unknown refresh policy"),
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDirectory("data"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the configured session storage backend
    pub fn session_storage(&self) -> Result<Arc<dyn SessionStorage>, ConfigError> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8080/api/v1");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.refresh_policy, RefreshPolicy::Independent);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (ENV_API_URL, "https://api.strategyforge.app/api/v1"),
            (ENV_API_TIMEOUT, "5000"),
            (ENV_STORAGE, "keyring"),
            (ENV_REFRESH_POLICY, "single-flight"),
        ]));
        assert_eq!(config.api_url, "https://api.strategyforge.app/api/v1");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.refresh_policy, RefreshPolicy::SingleFlight);
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let mut config = Config {
            timeout_ms: 1234,
            ..Config::default()
        };
        config.apply_env(env(&[(ENV_API_TIMEOUT, "soon")]));
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_partial_config_file() {
        let config: Config = serde_json::from_str(r#"{"storage":"memory"}"#).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/sf")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/sf"));
    }
}
