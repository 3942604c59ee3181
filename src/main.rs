//! Pool sniper operator tool
//!
//! The control loop itself is a library component driven by a chain feed and
//! an execution backend. This binary inspects what it would do with the
//! current configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pool_sniper::cli::commands;
use pool_sniper::config::{Config, LoggingConfig};

/// New-pool sniper
#[derive(Parser)]
#[command(name = "snipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config,

    /// Show the exit ladder for an entry
    Ladder {
        /// Units received on entry, as a decimal amount
        #[arg(long)]
        base_amount: String,

        /// Decimals of the traded token
        #[arg(long, default_value = "6")]
        base_decimals: u8,
    },

    /// Print the snipe list
    SnipeList {
        /// Read this file instead of the configured one
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pool_sniper={}", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => {
            init_tracing(&cfg.logging);
            cfg
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Config => commands::show_config(&config),
        Commands::Ladder {
            base_amount,
            base_decimals,
        } => commands::ladder(&config, &base_amount, base_decimals),
        Commands::SnipeList { path } => commands::snipe_list(&config, path).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
