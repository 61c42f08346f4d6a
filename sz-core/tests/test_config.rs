//! Integration tests for application configuration.
//!
//! Tests config loading from TOML, saving and reloading, default values,
//! endpoint sanitization, identity settings and ConfigHandle shared access.

use sz_core::config::{AppConfig, BackoffKind, ConfigHandle, UserId};
use tempfile::TempDir;

// ---- Default values ----

#[test]
fn default_config_has_expected_channel_defaults() {
    let config = AppConfig::default();
    assert!(config.channel.endpoint.is_empty(), "default endpoint should be empty");
    assert!(config.channel.protocols.is_empty());
    assert_eq!(config.channel.reconnect_interval_ms, 3_000);
    assert_eq!(config.channel.max_reconnect_attempts, 5);
    assert!(config.channel.auto_connect);
    assert!(config.channel.auto_authenticate);
    assert_eq!(config.channel.backoff, BackoffKind::Fixed);
    assert_eq!(config.channel.max_reconnect_delay_ms, 30_000);
    assert!((config.channel.jitter_factor - 0.3).abs() < f64::EPSILON);
    assert_eq!(config.channel.event_buffer, 256);
}

#[test]
fn default_config_has_expected_logging_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.directory.is_empty());
    assert!(!config.logging.json_output);
}

#[test]
fn default_config_has_no_identity() {
    let config = AppConfig::default();
    assert!(config.identity.user_id.is_none());
    assert!(config.identity.token.is_none());
    assert!(!config.identity.is_complete());
}

// ---- is_channel_configured / identity ----

#[test]
fn is_channel_configured_tracks_endpoint() {
    let mut config = AppConfig::default();
    assert!(!config.is_channel_configured());
    config.channel.endpoint = "wss://hub.example.edu/ws".into();
    assert!(config.is_channel_configured());
}

#[test]
fn identity_requires_user_id_and_non_empty_token() {
    let mut config = AppConfig::default();
    config.identity.user_id = Some(UserId::from("u1"));
    assert!(!config.identity.is_complete());
    config.identity.token = Some(String::new());
    assert!(!config.identity.is_complete());
    config.identity.token = Some("tok".into());
    assert!(config.identity.is_complete());
}

// ---- Endpoint sanitization ----

#[test]
fn sanitize_empty_endpoint_returns_empty() {
    assert_eq!(AppConfig::sanitize_endpoint(""), "");
    assert_eq!(AppConfig::sanitize_endpoint("  "), "");
}

#[test]
fn sanitize_maps_http_schemes_to_websocket() {
    assert_eq!(
        AppConfig::sanitize_endpoint("http://localhost:5000/ws"),
        "ws://localhost:5000/ws"
    );
    assert_eq!(
        AppConfig::sanitize_endpoint("https://hub.example.edu/ws"),
        "wss://hub.example.edu/ws"
    );
}

#[test]
fn sanitize_adds_ws_for_local_hosts() {
    assert_eq!(AppConfig::sanitize_endpoint("localhost:5000"), "ws://localhost:5000");
    assert_eq!(
        AppConfig::sanitize_endpoint("192.168.1.5:8080/ws"),
        "ws://192.168.1.5:8080/ws"
    );
}

#[test]
fn sanitize_adds_wss_for_remote_hosts() {
    assert_eq!(
        AppConfig::sanitize_endpoint("hub.example.edu/realtime"),
        "wss://hub.example.edu/realtime"
    );
}

#[test]
fn sanitize_strips_surrounding_whitespace_quotes_and_slashes() {
    assert_eq!(
        AppConfig::sanitize_endpoint("  \"wss://hub.example.edu/ws///\"  "),
        "wss://hub.example.edu/ws"
    );
}

// ---- TOML serialization round-trip ----

#[test]
fn config_toml_roundtrip_preserves_all_fields() {
    let mut config = AppConfig::default();
    config.channel.endpoint = "wss://hub.example.edu/ws".into();
    config.channel.protocols = vec!["stratizens.v1".into()];
    config.channel.reconnect_interval_ms = 1_500;
    config.channel.max_reconnect_attempts = 9;
    config.channel.auto_connect = false;
    config.channel.backoff = BackoffKind::Exponential;
    config.channel.jitter_factor = 0.1;
    config.identity.user_id = Some(UserId::Number(42));
    config.identity.token = Some("tok-42".into());
    config.logging.level = "debug".into();
    config.logging.json_output = true;

    let toml_str = toml::to_string_pretty(&config).unwrap();
    let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

    assert_eq!(deserialized.channel.endpoint, "wss://hub.example.edu/ws");
    assert_eq!(deserialized.channel.protocols, vec!["stratizens.v1".to_string()]);
    assert_eq!(deserialized.channel.reconnect_interval_ms, 1_500);
    assert_eq!(deserialized.channel.max_reconnect_attempts, 9);
    assert!(!deserialized.channel.auto_connect);
    assert_eq!(deserialized.channel.backoff, BackoffKind::Exponential);
    assert!((deserialized.channel.jitter_factor - 0.1).abs() < f64::EPSILON);
    assert_eq!(deserialized.identity.user_id, Some(UserId::Number(42)));
    assert_eq!(deserialized.identity.token.as_deref(), Some("tok-42"));
    assert_eq!(deserialized.logging.level, "debug");
    assert!(deserialized.logging.json_output);
}

#[test]
fn config_toml_deserialization_applies_defaults_for_missing_fields() {
    let toml_str = r#"
[channel]
endpoint = "ws://localhost:5000/ws"
backoff = "exponential"

[identity]
user_id = "student-7"
"#;

    let config: AppConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.channel.endpoint, "ws://localhost:5000/ws");
    assert_eq!(config.channel.backoff, BackoffKind::Exponential);
    assert_eq!(config.channel.reconnect_interval_ms, 3_000);
    assert!(config.channel.auto_authenticate);
    assert_eq!(config.identity.user_id, Some(UserId::Text("student-7".into())));
    assert!(config.identity.token.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn config_toml_empty_string_deserializes_to_defaults() {
    let config: AppConfig = toml::from_str("").unwrap();
    assert!(config.channel.endpoint.is_empty());
    assert_eq!(config.channel.max_reconnect_attempts, 5);
}

// ---- File save and load ----

#[test]
fn config_save_and_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.channel.endpoint = "wss://saved.example.edu/ws".into();
    config.identity.user_id = Some(UserId::from("u1"));
    config.identity.token = Some("file-test-token".into());

    config.save_to_file(&path).unwrap();
    assert!(path.exists(), "config file should be created");

    let loaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.channel.endpoint, "wss://saved.example.edu/ws");
    assert_eq!(loaded.identity.user_id, Some(UserId::from("u1")));
    assert_eq!(loaded.identity.token.as_deref(), Some("file-test-token"));
}

#[test]
fn config_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deep").join("config.toml");

    AppConfig::default().save_to_file(&path).unwrap();
    assert!(path.exists(), "should create nested directories");
}

#[test]
fn config_load_invalid_toml_returns_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.toml");
    std::fs::write(&path, "this is not valid {{ toml }}").unwrap();

    assert!(AppConfig::load_from_file(&path).is_err());
    assert!(AppConfig::load_from_file(&dir.path().join("missing.toml")).is_err());
}

// ---- ConfigHandle async access ----

#[tokio::test]
async fn config_handle_clone_shares_state() {
    let handle1 = ConfigHandle::new(AppConfig::default());
    let handle2 = handle1.clone();

    {
        let mut config = handle1.write().await;
        config.channel.endpoint = "wss://shared.example.edu/ws".into();
    }

    let config = handle2.read().await;
    assert_eq!(
        config.channel.endpoint, "wss://shared.example.edu/ws",
        "cloned ConfigHandle should share the same underlying state"
    );
}

#[tokio::test]
async fn config_handle_save_writes_to_its_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let handle = ConfigHandle::new(AppConfig::default()).with_path(path.clone());

    handle.write().await.channel.max_reconnect_attempts = 2;
    let saved = handle.save().await.unwrap();

    assert_eq!(saved, path);
    let loaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.channel.max_reconnect_attempts, 2);
}
