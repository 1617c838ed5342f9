// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Courier Dispatch CLI
//!
//! The `courier` binary runs the dispatch server and talks to a running one.
//!
//! ## Commands
//!
//! - `courier serve` - Run the HTTP + WebSocket dispatch server
//! - `courier distribute --category <land|air|sea>` - Trigger a batch distribution
//! - `courier config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use courier_core::domain::config::DispatchConfigManifest;
use courier_dispatch::commands::{self, ConfigCommand, DistributeArgs};
use courier_dispatch::server;

/// Courier dispatch - shipment claim arbitration for delivery agents
#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "COURIER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (default: from configuration, 8000)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// HTTP API host used by client commands
    #[arg(long, global = true, env = "COURIER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatch server
    #[command(name = "serve")]
    Serve,

    /// Distribute pending shipments of one category across available agents
    #[command(name = "distribute")]
    Distribute(DistributeArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = DispatchConfigManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            let logging = &config.spec.observability.logging;
            init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging.format)?;
            server::start_server(config, cli.port).await
        }
        Some(Commands::Distribute(args)) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "compact")?;
            commands::distribute::handle_command(args, cli.config, &cli.host, cli.port).await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "compact")?;
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}
