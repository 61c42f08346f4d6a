//! Connect command - open a channel to the hub and stream its events.

use console::style;
use dialoguer::Input;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};

use sz_core::config::{AppConfig, ConfigHandle, UserId};
use sz_core::error::{SzError, SzResult};
use sz_socket::{ChannelConfig, ChannelEvent, ChannelManager, StaticIdentity};

use crate::OutputFormat;

/// Connection overrides given on the command line.
pub struct ConnectArgs {
    pub endpoint: Option<String>,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub save: bool,
}

/// Run the connect command.
pub async fn run(config: ConfigHandle, args: ConnectArgs, format: OutputFormat) -> SzResult<()> {
    // Determine endpoint: arg > config > interactive prompt
    let endpoint = match args.endpoint {
        Some(e) => e,
        None => {
            let current = config.read().await.channel.endpoint.clone();
            if current.is_empty() {
                Input::<String>::new()
                    .with_prompt("Channel endpoint")
                    .interact_text()
                    .map_err(|e| SzError::Internal(e.to_string()))?
            } else {
                current
            }
        }
    };

    // Apply overrides to config
    {
        let mut cfg = config.write().await;
        cfg.channel.endpoint = AppConfig::sanitize_endpoint(&endpoint);
        if let Some(user_id) = args.user_id {
            cfg.identity.user_id = Some(UserId::parse(&user_id));
        }
        if let Some(token) = args.token {
            cfg.identity.token = Some(token);
        }
    }

    let (settings, identity_settings) = {
        let cfg = config.read().await;
        (cfg.channel.clone(), cfg.identity.clone())
    };
    if settings.endpoint.is_empty() {
        error!("no channel endpoint configured. Use --endpoint or set it in config.");
        return Err(SzError::MissingConfig("channel endpoint".into()));
    }
    let channel_config = ChannelConfig::from_settings(&settings)?;

    if args.save {
        let path = config.save().await?;
        println!("  {} Config saved to {}", style("OK").green(), path.display());
    }

    if !identity_settings.is_complete() {
        println!(
            "  {} No identity configured; the authentication handshake will be skipped.",
            style("NOTE").yellow()
        );
    }

    println!(
        "{} Connecting to {}...",
        style("[1/2]").bold().dim(),
        channel_config.endpoint
    );
    let auto_connect = channel_config.auto_connect;
    let manager = ChannelManager::builder(channel_config)
        .identity(StaticIdentity::from_settings(&identity_settings))
        .spawn();
    let mut events = manager.subscribe();
    if !auto_connect {
        manager.connect()?;
    }

    println!(
        "{} Listening for events. Lines typed on stdin are sent as text frames. (Ctrl+C to stop)",
        style("[2/2]").bold().dim(),
    );
    println!();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ev) => {
                    print_event(&ev, format);
                    if matches!(ev, ChannelEvent::ReconnectsExhausted { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    println!(
                        "  {} Missed {n} events (slow consumer)",
                        style("WARN").yellow()
                    );
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    if let Err(e) = manager.send_text(line).await {
                        println!("  {} {e}", style("DROPPED").yellow());
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Disconnecting...");
                break;
            }
        }
    }

    manager.close().await
}

fn print_event(event: &ChannelEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", event_json(event)),
        OutputFormat::Text => {
            let tag = style(format!("[{}]", event.name()));
            match event {
                ChannelEvent::Opened => println!("  {} connected", tag.green()),
                ChannelEvent::Message(m) => {
                    let body = match m.frame.as_text() {
                        Some(text) => text.to_string(),
                        None => format!("<{} binary bytes>", m.frame.len()),
                    };
                    println!(
                        "  {} {} {}",
                        tag.cyan(),
                        style(m.received_at.format("%H:%M:%S")).dim(),
                        body
                    );
                }
                ChannelEvent::Closed(info) => println!("  {} {info}", tag.yellow()),
                ChannelEvent::Error(e) => println!("  {} {e}", tag.red()),
                ChannelEvent::ReconnectScheduled { attempt, delay } => println!(
                    "  {} attempt {attempt} in {:.1}s",
                    tag.dim(),
                    delay.as_secs_f64()
                ),
                ChannelEvent::ReconnectsExhausted { attempts } => println!(
                    "  {} gave up after {attempts} attempts",
                    tag.red().bold()
                ),
            }
        }
    }
}

fn event_json(event: &ChannelEvent) -> serde_json::Value {
    let mut value = serde_json::json!({ "event": event.name() });
    match event {
        ChannelEvent::Opened => {}
        ChannelEvent::Message(m) => {
            value["received_at"] = serde_json::json!(m.received_at.to_rfc3339());
            value["data"] = match m.frame.parse_json::<serde_json::Value>() {
                Ok(json) => json,
                Err(_) => match m.frame.as_text() {
                    Some(text) => serde_json::json!(text),
                    None => serde_json::json!({ "binary_len": m.frame.len() }),
                },
            };
        }
        ChannelEvent::Closed(info) => {
            value["code"] = serde_json::json!(info.code);
            value["reason"] = serde_json::json!(info.reason);
            value["clean"] = serde_json::json!(info.clean);
        }
        ChannelEvent::Error(e) => value["error"] = serde_json::json!(e),
        ChannelEvent::ReconnectScheduled { attempt, delay } => {
            value["attempt"] = serde_json::json!(attempt);
            value["delay_ms"] = serde_json::json!(delay.as_millis() as u64);
        }
        ChannelEvent::ReconnectsExhausted { attempts } => {
            value["attempts"] = serde_json::json!(attempts);
        }
    }
    value
}
