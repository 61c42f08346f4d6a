//! Stratizens CLI - command-line client for the hub's realtime channel.
//!
//! Opens a channel from the terminal, prints everything the hub pushes, and
//! forwards typed lines as frames. Useful for debugging the server side and
//! for scripting against the event stream.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use sz_core::config::{AppConfig, ConfigHandle};
use sz_core::error::SzResult;
use sz_core::logging;
use sz_core::platform::Platform;

/// Stratizens - realtime channel client for the UniSphere hub.
#[derive(Parser)]
#[command(
    name = "stratizens",
    version,
    about = "Stratizens realtime channel CLI",
    long_about = "A command-line client for the UniSphere hub's realtime channel.\n\
                  Connects, authenticates and streams live events to the terminal."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the hub and stream channel events.
    Connect {
        /// Channel endpoint (overrides config).
        #[arg(short, long)]
        endpoint: Option<String>,
        /// User id for the authentication handshake (overrides config).
        #[arg(short, long)]
        user_id: Option<String>,
        /// Session token for the authentication handshake (overrides config).
        #[arg(short, long)]
        token: Option<String>,
        /// Save connection settings to the config file before connecting.
        #[arg(long)]
        save: bool,
    },
    /// View and modify configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> SzResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };
    let config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    // Initialize logging
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = if cli.verbose {
        logging::init_logging("debug", &log_dir, config.logging.json_output)?
    } else {
        logging::init_from_config(&config.logging, &log_dir)?
    };

    let config_handle = ConfigHandle::new(config).with_path(config_path);

    info!(
        "Stratizens CLI v{} on {}",
        sz_core::constants::APP_VERSION,
        Platform::current()
    );

    // Dispatch to command handlers
    match cli.command {
        Commands::Connect {
            endpoint,
            user_id,
            token,
            save,
        } => {
            let args = commands::connect::ConnectArgs {
                endpoint,
                user_id,
                token,
                save,
            };
            commands::connect::run(config_handle, args, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, action, cli.format).await
        }
    }
}
