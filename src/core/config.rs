use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root data directory for storyweave.
/// Unix: `~/.storyweave`, Windows: `%APPDATA%\storyweave`.
/// `STORYWEAVE_DATA_DIR` overrides both (used by tests and sandboxed runs).
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STORYWEAVE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    #[cfg(windows)]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storyweave")
    }
    #[cfg(not(windows))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".storyweave")
    }
}

/// Client configuration, persisted as `config.toml` under the data dir.
/// Every field has a default so a missing or partial file still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the story-generation backend.
    pub api_base_url: String,
    /// Seconds between job status polls.
    pub poll_interval_secs: u64,
    /// How many times a failed poll is retried before the tracker gives up.
    /// 0 means the first failure is terminal.
    pub poll_retry_attempts: u32,
    /// Delay before each poll retry.
    pub poll_retry_backoff_secs: u64,
    /// Bounded wait for API-class requests before falling back to cache.
    pub api_wait_secs: u64,
    /// Bounded wait for media-class requests.
    pub media_wait_secs: u64,
    /// Cache version string; bumping it invalidates all partitions.
    pub cache_version: String,
    /// Paths eagerly populated into the shell partition on install.
    pub shell_files: Vec<String>,
    /// Path prefix that marks a request as API traffic.
    pub api_prefix: String,
    /// Seconds between background update checks.
    pub update_check_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_secs: 2,
            poll_retry_attempts: 0,
            poll_retry_backoff_secs: 3,
            api_wait_secs: 10,
            media_wait_secs: 30,
            cache_version: "v1".to_string(),
            shell_files: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/app.js".to_string(),
                "/app.css".to_string(),
                "/manifest.json".to_string(),
            ],
            api_prefix: "/api/".to_string(),
            update_check_interval_secs: 6 * 60 * 60,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        data_dir().join("config.toml")
    }

    /// Load the config file, falling back to defaults when absent.
    /// `STORYWEAVE_API_URL` overrides the base URL either way.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("Invalid config at {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("STORYWEAVE_API_URL")
            && !url.trim().is_empty()
        {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(&path, raw)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_observed_client_values() {
        let c = Config::default();
        assert_eq!(c.poll_interval_secs, 2);
        assert_eq!(c.api_wait_secs, 10);
        assert_eq!(c.media_wait_secs, 30);
        assert_eq!(c.poll_retry_attempts, 0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let c: Config = toml::from_str("api_base_url = \"https://stories.example\"").unwrap();
        assert_eq!(c.api_base_url, "https://stories.example");
        assert_eq!(c.cache_version, "v1");
        assert!(c.shell_files.contains(&"/".to_string()));
    }
}
