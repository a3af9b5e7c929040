// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Delta block commands
//!
//! Commands: parse

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use tessera_core::domain::message::ThreadMessage;
use tessera_core::infrastructure::delta_parser::{DeltaParser, ParsedBlock};

#[derive(Subcommand)]
pub enum DeltaCommand {
    /// Parse the delta blocks of a draft message body
    Parse {
        /// Markdown file holding the message body
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Agent name to attribute the blocks to
        #[arg(short, long, default_value = "local")]
        sender: String,

        /// Print parsed blocks as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: DeltaCommand) -> Result<()> {
    match command {
        DeltaCommand::Parse { file, sender, json } => parse(file, sender, json).await,
    }
}

async fn parse(file: PathBuf, sender: String, json: bool) -> Result<()> {
    let body = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read message body: {:?}", file))?;
    let blocks = parse_body(body, sender);

    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else if blocks.is_empty() {
        println!("{}", "No delta blocks found".dimmed());
    } else {
        for (index, block) in blocks.iter().enumerate() {
            match block {
                ParsedBlock::Valid(delta) => {
                    let target = delta.op.target().map(|t| format!(" {}", t)).unwrap_or_default();
                    println!(
                        "  {} block {}: {} {}{}",
                        "✓".green(),
                        index,
                        delta.kind(),
                        delta.section,
                        target
                    );
                }
                ParsedBlock::Invalid(invalid) => {
                    println!("  {} block {}: {}", "✗".red(), index, invalid.reason);
                }
            }
        }
    }

    let rejected = blocks.iter().filter(|b| !b.is_valid()).count();
    if rejected > 0 {
        anyhow::bail!("{} of {} delta block(s) rejected", rejected, blocks.len());
    }
    Ok(())
}

fn parse_body(body: String, sender: String) -> Vec<ParsedBlock> {
    let message = ThreadMessage {
        id: 0,
        sender,
        created_ts: Utc::now(),
        subject: None,
        thread_id: None,
        body,
    };
    DeltaParser::parse_message(&message)
}
