//! Config commands.

use clap::Subcommand;
use console::style;

use sz_core::config::{AppConfig, BackoffKind, ConfigHandle, UserId};
use sz_core::constants;
use sz_core::error::{SzError, SzResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the current configuration (token redacted).
    Show,
    /// Print the config file path.
    Path,
    /// Get a single value by key path.
    Get {
        /// Key path (e.g., "channel.endpoint", "channel.max_reconnect_attempts").
        key: String,
    },
    /// Set a single value by key path and save.
    Set {
        /// Key path (e.g., "channel.endpoint", "channel.max_reconnect_attempts").
        key: String,
        /// New value.
        value: String,
    },
    /// Set the channel endpoint.
    SetEndpoint {
        /// ws/wss URL, or a bare host.
        endpoint: String,
    },
    /// Set the identity used by the authentication handshake.
    SetIdentity {
        /// User id (numeric ids are stored as numbers).
        user_id: String,
        /// Session token.
        token: String,
    },
    /// Remove the stored identity.
    ClearIdentity,
}

fn parse_bool(value: &str) -> Result<bool, String> {
    value.parse().map_err(|_| "expected true/false".to_string())
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value.parse().map_err(|_| "invalid number".to_string())
}

/// Resolve a dot-separated key path to a value from the config.
fn get_setting_value(cfg: &AppConfig, key: &str) -> Option<String> {
    let channel = &cfg.channel;
    match key {
        "channel.endpoint" => Some(channel.endpoint.clone()),
        "channel.protocols" => Some(channel.protocols.join(",")),
        "channel.reconnect_interval_ms" => Some(channel.reconnect_interval_ms.to_string()),
        "channel.max_reconnect_attempts" => Some(channel.max_reconnect_attempts.to_string()),
        "channel.auto_connect" => Some(channel.auto_connect.to_string()),
        "channel.auto_authenticate" => Some(channel.auto_authenticate.to_string()),
        "channel.backoff" => Some(backoff_name(channel.backoff).to_string()),
        "channel.max_reconnect_delay_ms" => Some(channel.max_reconnect_delay_ms.to_string()),
        "channel.jitter_factor" => Some(channel.jitter_factor.to_string()),
        "channel.event_buffer" => Some(channel.event_buffer.to_string()),
        "identity.user_id" => Some(
            cfg.identity
                .user_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ),
        "identity.token" => Some(redact(cfg.identity.token.as_deref())),
        "logging.level" => Some(cfg.logging.level.clone()),
        "logging.directory" => Some(cfg.logging.directory.clone()),
        "logging.json_output" => Some(cfg.logging.json_output.to_string()),
        _ => None,
    }
}

/// Apply a value to a dot-separated key path on the config.
fn set_setting_value(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), String> {
    let channel = &mut cfg.channel;
    match key {
        "channel.endpoint" => channel.endpoint = AppConfig::sanitize_endpoint(value),
        "channel.protocols" => {
            channel.protocols = value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        "channel.reconnect_interval_ms" => channel.reconnect_interval_ms = parse_number(value)?,
        "channel.max_reconnect_attempts" => channel.max_reconnect_attempts = parse_number(value)?,
        "channel.auto_connect" => channel.auto_connect = parse_bool(value)?,
        "channel.auto_authenticate" => channel.auto_authenticate = parse_bool(value)?,
        "channel.backoff" => {
            channel.backoff = match value.to_lowercase().as_str() {
                "fixed" => BackoffKind::Fixed,
                "exponential" => BackoffKind::Exponential,
                _ => return Err("expected fixed or exponential".to_string()),
            };
        }
        "channel.max_reconnect_delay_ms" => channel.max_reconnect_delay_ms = parse_number(value)?,
        "channel.jitter_factor" => {
            let factor: f64 = parse_number(value)?;
            if !(0.0..=1.0).contains(&factor) {
                return Err("expected a value between 0 and 1".to_string());
            }
            channel.jitter_factor = factor;
        }
        "channel.event_buffer" => {
            let capacity: usize = parse_number(value)?;
            if !(1..=constants::MAX_EVENT_BUFFER).contains(&capacity) {
                return Err(format!(
                    "expected a value between 1 and {}",
                    constants::MAX_EVENT_BUFFER
                ));
            }
            channel.event_buffer = capacity;
        }
        "identity.user_id" => cfg.identity.user_id = Some(UserId::parse(value)),
        "identity.token" => cfg.identity.token = Some(value.to_string()),
        "logging.level" => {
            let v = value.to_lowercase();
            if !["trace", "debug", "info", "warn", "error"].contains(&v.as_str()) {
                return Err("expected one of: trace, debug, info, warn, error".to_string());
            }
            cfg.logging.level = v;
        }
        "logging.directory" => cfg.logging.directory = value.to_string(),
        "logging.json_output" => cfg.logging.json_output = parse_bool(value)?,
        _ => return Err(format!("unknown setting key: {key}")),
    }
    Ok(())
}

fn backoff_name(kind: BackoffKind) -> &'static str {
    match kind {
        BackoffKind::Fixed => "fixed",
        BackoffKind::Exponential => "exponential",
    }
}

fn redact(token: Option<&str>) -> String {
    match token {
        Some(t) if !t.is_empty() => "********".to_string(),
        _ => String::new(),
    }
}

fn print_config_text(cfg: &AppConfig) {
    let c = &cfg.channel;
    println!("{}", style("Channel").bold().underlined());
    println!("  channel.endpoint                {}", c.endpoint);
    println!("  channel.protocols               {}", c.protocols.join(","));
    println!("  channel.reconnect_interval_ms   {}", c.reconnect_interval_ms);
    println!("  channel.max_reconnect_attempts  {}", c.max_reconnect_attempts);
    println!("  channel.auto_connect            {}", c.auto_connect);
    println!("  channel.auto_authenticate       {}", c.auto_authenticate);
    println!("  channel.backoff                 {}", backoff_name(c.backoff));
    println!("  channel.max_reconnect_delay_ms  {}", c.max_reconnect_delay_ms);
    println!("  channel.jitter_factor           {}", c.jitter_factor);
    println!("  channel.event_buffer            {}", c.event_buffer);

    println!();
    println!("{}", style("Identity").bold().underlined());
    let user_id = cfg.identity.user_id.as_ref().map(ToString::to_string);
    println!("  identity.user_id                {}", user_id.unwrap_or_default());
    println!("  identity.token                  {}", redact(cfg.identity.token.as_deref()));

    println!();
    println!("{}", style("Logging").bold().underlined());
    println!("  logging.level                   {}", cfg.logging.level);
    println!("  logging.directory               {}", cfg.logging.directory);
    println!("  logging.json_output             {}", cfg.logging.json_output);
}

fn config_json(cfg: &AppConfig) -> serde_json::Value {
    let c = &cfg.channel;
    serde_json::json!({
        "channel": {
            "endpoint": c.endpoint,
            "protocols": c.protocols,
            "reconnect_interval_ms": c.reconnect_interval_ms,
            "max_reconnect_attempts": c.max_reconnect_attempts,
            "auto_connect": c.auto_connect,
            "auto_authenticate": c.auto_authenticate,
            "backoff": backoff_name(c.backoff),
            "max_reconnect_delay_ms": c.max_reconnect_delay_ms,
            "jitter_factor": c.jitter_factor,
            "event_buffer": c.event_buffer,
        },
        "identity": {
            "user_id": cfg.identity.user_id,
            "token": redact(cfg.identity.token.as_deref()),
        },
        "logging": {
            "level": cfg.logging.level,
            "directory": cfg.logging.directory,
            "json_output": cfg.logging.json_output,
        },
    })
}

pub async fn run(config: ConfigHandle, action: ConfigAction, format: OutputFormat) -> SzResult<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config.read().await;
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&config_json(&cfg))?;
                    println!("{json}");
                }
                OutputFormat::Text => print_config_text(&cfg),
            }
        }
        ConfigAction::Path => {
            let path = config.path()?;
            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({ "path": path, "exists": path.exists() })
                    );
                }
                OutputFormat::Text => println!("{}", path.display()),
            }
        }
        ConfigAction::Get { key } => {
            let cfg = config.read().await;
            let value = get_setting_value(&cfg, &key)
                .ok_or_else(|| SzError::Config(format!("unknown setting key: {key}")))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "key": key, "value": value })),
                OutputFormat::Text => println!("{key} = {value}"),
            }
        }
        ConfigAction::Set { key, value } => {
            {
                let mut cfg = config.write().await;
                set_setting_value(&mut cfg, &key, &value)
                    .map_err(|e| SzError::Config(format!("failed to set {key}: {e}")))?;
            }
            let path = config.save().await?;
            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({ "key": key, "value": value, "saved": path })
                    );
                }
                OutputFormat::Text => {
                    println!("{} {key} = {value}", style("SET").green().bold());
                }
            }
        }
        ConfigAction::SetEndpoint { endpoint } => {
            let sanitized = AppConfig::sanitize_endpoint(&endpoint);
            if sanitized.is_empty() {
                return Err(SzError::InvalidEndpoint("endpoint is empty".into()));
            }
            config.write().await.channel.endpoint = sanitized.clone();
            config.save().await?;
            println!(
                "{} Channel endpoint set to: {}",
                style("SET").green().bold(),
                sanitized
            );
        }
        ConfigAction::SetIdentity { user_id, token } => {
            let user_id = UserId::parse(&user_id);
            {
                let mut cfg = config.write().await;
                cfg.identity.user_id = Some(user_id.clone());
                cfg.identity.token = Some(token);
            }
            config.save().await?;
            println!(
                "{} Identity set for user {}.",
                style("SET").green().bold(),
                user_id
            );
        }
        ConfigAction::ClearIdentity => {
            {
                let mut cfg = config.write().await;
                cfg.identity.user_id = None;
                cfg.identity.token = None;
            }
            config.save().await?;
            println!("{} Identity cleared.", style("OK").green().bold());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_channel_keys() {
        let mut cfg = AppConfig::default();
        set_setting_value(&mut cfg, "channel.endpoint", "localhost:5000/ws").unwrap();
        set_setting_value(&mut cfg, "channel.max_reconnect_attempts", "7").unwrap();
        set_setting_value(&mut cfg, "channel.backoff", "Exponential").unwrap();
        set_setting_value(&mut cfg, "channel.protocols", "a, b,").unwrap();

        assert_eq!(
            get_setting_value(&cfg, "channel.endpoint").as_deref(),
            Some("ws://localhost:5000/ws")
        );
        assert_eq!(cfg.channel.max_reconnect_attempts, 7);
        assert_eq!(cfg.channel.backoff, BackoffKind::Exponential);
        assert_eq!(cfg.channel.protocols, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        assert!(set_setting_value(&mut cfg, "channel.auto_connect", "maybe").is_err());
        assert!(set_setting_value(&mut cfg, "channel.jitter_factor", "1.5").is_err());
        assert!(set_setting_value(&mut cfg, "logging.level", "loud").is_err());
        assert!(set_setting_value(&mut cfg, "nope", "1").is_err());
        assert!(set_setting_value(&mut cfg, "channel.event_buffer", "0").is_err());
        assert!(set_setting_value(&mut cfg, "channel.event_buffer", &usize::MAX.to_string()).is_err());
        assert_eq!(cfg.channel.event_buffer, constants::DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_token_is_redacted() {
        let mut cfg = AppConfig::default();
        set_setting_value(&mut cfg, "identity.user_id", "42").unwrap();
        set_setting_value(&mut cfg, "identity.token", "secret").unwrap();
        assert_eq!(cfg.identity.user_id, Some(UserId::Number(42)));
        assert_eq!(
            get_setting_value(&cfg, "identity.token").as_deref(),
            Some("********")
        );
        assert_eq!(config_json(&cfg)["identity"]["user_id"], 42);
    }
}
