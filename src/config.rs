//! Layered configuration for BuilderHub.
//!
//! Values are resolved file → environment → CLI flags. The file lives at
//! `<config_dir>/builderhub/config.toml` unless `--config` points elsewhere.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8001"
//! timeout_secs = 30
//!
//! [realtime]
//! mode = "polling"
//! poll_interval_ms = 2000
//! reconcile = "snapshot_wins"
//!
//! [session]
//! token_file = "/home/me/.config/builderhub/session.json"
//!
//! [logging]
//! format = "pretty"
//! directory = "/var/log/builderhub"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::realtime::ReconcilePolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8001";

pub const ENV_API_URL: &str = "BUILDERHUB_API_URL";
pub const ENV_TOKEN_FILE: &str = "BUILDERHUB_TOKEN_FILE";
pub const ENV_POLL_INTERVAL_MS: &str = "BUILDERHUB_POLL_INTERVAL_MS";
pub const ENV_LOG_FORMAT: &str = "BUILDERHUB_LOG_FORMAT";

/// How live collections are fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeMode {
    /// Poll the REST gateway and emit a snapshot whenever the result changes.
    #[default]
    Polling,
    /// No live subscription; every live collection takes the one-shot
    /// fallback path.
    Off,
}

impl std::str::FromStr for RealtimeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "polling" => Ok(Self::Polling),
            "off" => Ok(Self::Off),
            _ => anyhow::bail!("Invalid realtime mode '{}'. Valid values: polling, off", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSection {
    #[serde(default)]
    pub mode: RealtimeMode,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self {
            mode: RealtimeMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    /// Where the bearer token is persisted. Defaults next to the config file.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// Optional directory for a daily-rolling log file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// The complete config.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub realtime: RealtimeSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl HubConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Load from `path` if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|v| !v.trim().is_empty()) {
            self.session.token_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup(ENV_POLL_INTERVAL_MS) {
            self.realtime.poll_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got '{}'", ENV_POLL_INTERVAL_MS, ms))?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    /// Backend origin without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.realtime.poll_interval_ms)
    }

    /// Token file, falling back to `<config_dir>/builderhub/session.json`.
    pub fn token_file(&self) -> PathBuf {
        self.session
            .token_file
            .clone()
            .unwrap_or_else(|| config_dir().join("session.json"))
    }

    /// Return warnings for values that load but will not behave well.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let url = self.api_base_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warnings.push(format!(
                "api.base_url '{}' should start with http:// or https://",
                self.api.base_url
            ));
        }
        if self.api.timeout_secs == 0 {
            warnings.push("api.timeout_secs is 0; every request will time out".to_string());
        }
        if self.realtime.mode == RealtimeMode::Polling && self.realtime.poll_interval_ms < 100 {
            warnings.push(format!(
                "realtime.poll_interval_ms {} is very low; the backend will be polled aggressively",
                self.realtime.poll_interval_ms
            ));
        }
        warnings
    }
}

/// `<platform config dir>/builderhub`, or `./.builderhub` when the
/// platform has none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("builderhub"))
        .unwrap_or_else(|| PathBuf::from(".builderhub"))
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.realtime.mode, RealtimeMode::Polling);
        assert_eq!(config.realtime.reconcile, ReconcilePolicy::SnapshotWins);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = HubConfig::parse(
            r#"
            [api]
            base_url = "https://api.example.com/"

            [realtime]
            mode = "off"
            reconcile = "pending_version"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url(), "https://api.example.com");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.realtime.mode, RealtimeMode::Off);
        assert_eq!(config.realtime.reconcile, ReconcilePolicy::PendingVersion);
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert!(HubConfig::parse("[realtime]\nmode = \"websocket\"").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = HubConfig::parse("[api]\nbase_url = \"http://file:1\"").unwrap();
        config
            .apply_env_from(env(&[
                (ENV_API_URL, "http://env:2"),
                (ENV_POLL_INTERVAL_MS, "250"),
                (ENV_LOG_FORMAT, "json"),
                (ENV_TOKEN_FILE, "/tmp/token.json"),
            ]))
            .unwrap();
        assert_eq!(config.api_base_url(), "http://env:2");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.token_file(), PathBuf::from("/tmp/token.json"));
    }

    #[test]
    fn test_blank_env_url_is_ignored() {
        let mut config = HubConfig::default();
        config.apply_env_from(env(&[(ENV_API_URL, "  ")])).unwrap();
        assert_eq!(config.api_base_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_invalid_poll_interval_env_is_error() {
        let mut config = HubConfig::default();
        let result = config.apply_env_from(env(&[(ENV_POLL_INTERVAL_MS, "soon")]));
        assert!(result.unwrap_err().to_string().contains(ENV_POLL_INTERVAL_MS));
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = HubConfig::default();
        config.api.base_url = "localhost:8001".to_string();
        config.api.timeout_secs = 0;
        config.realtime.poll_interval_ms = 10;
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg/config.toml");
        let mut config = HubConfig::default();
        config.api.base_url = "http://saved:9".to_string();
        config.save(&path).unwrap();
        let loaded = HubConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.api_base_url(), "http://saved:9");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = HubConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api_base_url(), DEFAULT_API_URL);
    }
}
