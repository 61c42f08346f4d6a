//! Application configuration management.
//!
//! Handles loading, saving, and accessing the channel endpoint, reconnect
//! settings, the identity used by the authentication handshake, and logging
//! preferences. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{SzError, SzResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime channel settings.
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Identity announced after each successful open.
    #[serde(default)]
    pub identity: IdentitySettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// The same delay before every attempt.
    #[default]
    Fixed,
    /// Doubling delay capped at `max_reconnect_delay_ms`, with jitter.
    Exponential,
}

/// Realtime channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// WebSocket endpoint, e.g. "wss://hub.example.edu/ws".
    #[serde(default)]
    pub endpoint: String,

    /// Sub-protocols offered during the handshake.
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Delay before a reconnect attempt in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Reconnect attempts allowed after consecutive unexpected closes.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Open the connection as soon as the channel is created.
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Send the authenticate frame after every open.
    #[serde(default = "default_true")]
    pub auto_authenticate: bool,

    /// Reconnect delay strategy.
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Upper bound for exponential delays in milliseconds.
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_ms: u64,

    /// Jitter factor (0.0 to 1.0) applied to exponential delays.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Capacity of the event broadcast buffer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// A user reference as the hub's server accepts it: numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    /// Parse user input: all-digit values become numeric ids.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.parse::<i64>() {
            Ok(n) => UserId::Number(n),
            Err(_) => UserId::Text(input.to_string()),
        }
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId::Text(s)
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Number(n)
    }
}

/// Identity settings. The handshake is skipped unless both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// User id issued by the hub's session service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Session token issued alongside the user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl IdentitySettings {
    /// Whether both parts of the identity are configured.
    pub fn is_complete(&self) -> bool {
        self.user_id.is_some() && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output in the log file.
    #[serde(default)]
    pub json_output: bool,
}

fn default_reconnect_interval() -> u64 {
    constants::DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_max_reconnect_attempts() -> u32 {
    constants::DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_true() -> bool {
    true
}

fn default_max_reconnect_delay() -> u64 {
    constants::DEFAULT_MAX_RECONNECT_DELAY_MS
}

fn default_jitter_factor() -> f64 {
    constants::DEFAULT_JITTER_FACTOR
}

fn default_event_buffer() -> usize {
    constants::DEFAULT_EVENT_BUFFER
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            protocols: Vec::new(),
            reconnect_interval_ms: default_reconnect_interval(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            auto_connect: true,
            auto_authenticate: true,
            backoff: BackoffKind::Fixed,
            max_reconnect_delay_ms: default_max_reconnect_delay(),
            jitter_factor: default_jitter_factor(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> SzResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> SzResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> SzResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SzError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> SzResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> SzResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether a channel endpoint is configured.
    pub fn is_channel_configured(&self) -> bool {
        !self.channel.endpoint.is_empty()
    }

    /// Sanitize and normalize a channel endpoint.
    ///
    /// Strips quotes and trailing slashes, maps http/https to ws/wss, and
    /// adds a scheme when missing (wss for non-local hosts, ws for
    /// localhost and bare IPv4 addresses).
    pub fn sanitize_endpoint(endpoint: &str) -> String {
        let trimmed = endpoint.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
            trimmed.to_string()
        } else if is_local_host(trimmed) {
            format!("ws://{trimmed}")
        } else {
            format!("wss://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

fn is_local_host(address: &str) -> bool {
    let host = address.split(['/', ':']).next().unwrap_or(address);
    host == "localhost" || host.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Thread-safe configuration holder for shared access.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Remember the file this configuration was loaded from.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// The file `save` writes to.
    pub fn path(&self) -> SzResult<PathBuf> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => AppConfig::default_config_path(),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> SzResult<PathBuf> {
        let path = self.path()?;
        self.inner.read().await.save_to_file(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.channel.reconnect_interval_ms, 3_000);
        assert_eq!(config.channel.max_reconnect_attempts, 5);
        assert!(config.channel.auto_connect);
        assert!(config.channel.auto_authenticate);
        assert_eq!(config.channel.backoff, BackoffKind::Fixed);
        assert_eq!(config.logging.level, "info");
        assert!(!config.is_channel_configured());
        assert!(!config.identity.is_complete());
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(UserId::parse("42"), UserId::Number(42));
        assert_eq!(UserId::parse(" u1 "), UserId::Text("u1".into()));
        assert_eq!(UserId::parse("42a").to_string(), "42a");
    }

    #[test]
    fn test_sanitize_endpoint() {
        assert_eq!(
            AppConfig::sanitize_endpoint("hub.example.edu/ws/"),
            "wss://hub.example.edu/ws"
        );
        assert_eq!(
            AppConfig::sanitize_endpoint("http://192.168.1.100:5000/"),
            "ws://192.168.1.100:5000"
        );
        assert_eq!(
            AppConfig::sanitize_endpoint("  \"https://example.com/ws\"  "),
            "wss://example.com/ws"
        );
        assert_eq!(
            AppConfig::sanitize_endpoint("localhost:5000/ws"),
            "ws://localhost:5000/ws"
        );
        assert_eq!(AppConfig::sanitize_endpoint("10.0.0.5:5000"), "ws://10.0.0.5:5000");
        assert_eq!(AppConfig::sanitize_endpoint("wss://a.b/c"), "wss://a.b/c");
        assert_eq!(AppConfig::sanitize_endpoint("   "), "");
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = AppConfig::default();
        config.channel.endpoint = "wss://hub.example.edu/ws".into();
        config.channel.backoff = BackoffKind::Exponential;
        config.identity.user_id = Some(UserId::Number(42));
        config.identity.token = Some("t0k".into());

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.channel.endpoint, config.channel.endpoint);
        assert_eq!(deserialized.channel.backoff, BackoffKind::Exponential);
        assert_eq!(deserialized.identity.user_id, Some(UserId::Number(42)));
        assert!(deserialized.identity.is_complete());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [channel]
            endpoint = "ws://localhost:5000/ws"
            max_reconnect_attempts = 2

            [identity]
            user_id = "ADM-2024-001"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.channel.max_reconnect_attempts, 2);
        assert_eq!(config.channel.reconnect_interval_ms, 3_000);
        assert_eq!(config.identity.user_id, Some(UserId::from("ADM-2024-001")));
        assert!(!config.identity.is_complete());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.channel.protocols = vec!["stratizens.v1".into()];
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.channel.protocols, vec!["stratizens.v1".to_string()]);
    }

    #[tokio::test]
    async fn test_config_handle_save_uses_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let handle = ConfigHandle::new(AppConfig::default()).with_path(path.clone());

        handle.write().await.channel.endpoint = "wss://x.test/ws".into();
        let written = handle.save().await.unwrap();
        assert_eq!(written, path);

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.channel.endpoint, "wss://x.test/ws");
    }
}
