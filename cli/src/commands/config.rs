// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use tessera_core::domain::config::{ConfigOrigin, ToolkitConfigManifest};
use tessera_core::domain::section::Section;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./tessera-config.yaml)
        #[arg(short, long, default_value = "./tessera-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ToolkitConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if config_override.is_none() {
            println!("  {}: {}", ConfigOrigin::Flag, "(not set)".dimmed());
        }
        for (index, (origin, path)) in ToolkitConfigManifest::candidate_paths(config_override).into_iter().enumerate() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {}. {}: {} ({})", index + 1, origin, path.display(), marker);
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let mail = &config.spec.mail;
    println!("{}", "Mail Service:".bold());
    println!("  Endpoint: {}", mail.endpoint);
    println!("  Project: {}", mail.project);
    println!("  Sender: {}", mail.sender);
    println!(
        "  API token: {}",
        if mail.resolved_token().is_some() { "set" } else { "(none)" }
    );
    println!("  Timeout: {}s", mail.timeout_seconds);
    println!();

    println!("{}", "Sections:".bold());
    println!("  {:<24} {:>7} {:>7}", "section", "min", "max");
    for section in Section::ALL {
        let limit = config
            .spec
            .merge
            .limit(section)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>7} {:>7}",
            section.to_string(),
            config.spec.lint.minimum(section),
            limit
        );
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ToolkitConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples { EXAMPLES_TEMPLATE } else { MINIMAL_TEMPLATE };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
