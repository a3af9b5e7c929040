// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Tessera CLI
//!
//! The `tessera` binary compiles a research thread's message history into a
//! versioned artifact and reports what was merged, skipped and linted.
//!
//! ## Commands
//!
//! - `tessera artifact compile|lint` - Fold a thread into its artifact
//! - `tessera delta parse` - Check the delta blocks of a message before sending
//! - `tessera config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tessera_cli::commands::{self, ArtifactCommand, ConfigCommand, DeltaCommand};

/// Tessera - deterministic research artifacts from agent message threads
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "TESSERA_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TESSERA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, global = true, env = "TESSERA_LOG_FORMAT", default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and lint research artifacts
    #[command(name = "artifact")]
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommand,
    },

    /// Inspect delta blocks
    #[command(name = "delta")]
    Delta {
        #[command(subcommand)]
        command: DeltaCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Artifact { command } => commands::artifact::handle_command(command, cli.config).await,
        Commands::Delta { command } => commands::delta::handle_command(command).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the rendered artifact or JSON report.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        "text" => builder.compact().init(),
        other => anyhow::bail!("Unknown log format '{}'. Use 'text' or 'json'", other),
    }

    Ok(())
}
