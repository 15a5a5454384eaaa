use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SYNC_RETRIES, DEFAULT_TONE,
};

const ENV_BASE_URL: &str = "DRAFTLY_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub draft: DraftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend origin, e.g. `http://localhost:8000`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout (None = leave it to the transport)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Login page of the identity provider, served by the backend
    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Network retries per sync before reporting failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    #[serde(default = "default_tone")]
    pub default_tone: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            default_tone: default_tone(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_SYNC_RETRIES
}

fn default_tone() -> String {
    DEFAULT_TONE.to_string()
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("draftly");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the config file, falling back to defaults when none exists.
    /// `DRAFTLY_BASE_URL` overrides the configured backend.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(url) = std::env::var(ENV_BASE_URL)
            && !url.trim().is_empty()
        {
            config.server.base_url = url.trim().to_string();
        }

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = Self::config_dir()?;

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            base_url = "https://drafts.example.com"
            request_timeout_secs = 20

            [sync]
            poll_interval_secs = 30
            max_retries = 0

            [draft]
            default_tone = "Friendly"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.server.base_url, "https://drafts.example.com");
        assert_eq!(config.server.request_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.sync.max_retries, 0);
        assert_eq!(config.draft.default_tone, "Friendly");
        assert_eq!(
            config.server.login_url(),
            "https://drafts.example.com/auth/login"
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.server.request_timeout(), None);
        assert_eq!(config.sync.poll_interval_secs, 120);
        assert_eq!(config.sync.max_retries, DEFAULT_SYNC_RETRIES);
        assert_eq!(config.draft.default_tone, "Professional");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = Config::parse("[sync]\npoll_interval_secs = 0\n").unwrap();
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
    }
}
