// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Artifact commands
//!
//! Commands: compile, lint

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tessera_core::application::compile::{CompileOutcome, CompileService, MergeOutcome};
use tessera_core::application::lint::{LintReport, Severity};
use tessera_core::domain::config::ToolkitConfigManifest;
use tessera_core::domain::message::MessageSource;
use tessera_core::infrastructure::mail_client::HttpMailClient;
use tessera_core::infrastructure::message_file::FileMessageSource;

#[derive(Subcommand)]
pub enum ArtifactCommand {
    /// Compile a thread's delta history into its artifact
    Compile {
        /// Research thread ID
        #[arg(short, long, value_name = "THREAD_ID")]
        thread: String,

        /// Read messages from a JSON export instead of the mail service
        #[arg(short, long, value_name = "FILE")]
        messages: Option<PathBuf>,

        /// Write the rendered artifact here (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print the full compile outcome as JSON
        #[arg(long)]
        json: bool,

        /// Post the artifact back to the thread when lint passes
        #[arg(long)]
        publish: bool,
    },

    /// Compile a thread and report lint findings only
    Lint {
        /// Research thread ID
        #[arg(short, long, value_name = "THREAD_ID")]
        thread: String,

        /// Read messages from a JSON export instead of the mail service
        #[arg(short, long, value_name = "FILE")]
        messages: Option<PathBuf>,

        /// Print the lint report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: ArtifactCommand, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = ToolkitConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;

    match command {
        ArtifactCommand::Compile {
            thread,
            messages,
            output,
            json,
            publish,
        } => compile(&manifest, &thread, messages, output, json, publish).await,
        ArtifactCommand::Lint { thread, messages, json } => lint(&manifest, &thread, messages, json).await,
    }
}

/// Builds the compile service. A message file replaces the mail service as
/// the source; publishing always goes through the mail service.
fn build_service(manifest: &ToolkitConfigManifest, messages: Option<PathBuf>, publish: bool) -> Result<CompileService> {
    let source: Arc<dyn MessageSource> = match messages {
        Some(path) => {
            info!("Reading thread history from {}", path.display());
            Arc::new(FileMessageSource::new(path))
        }
        None => {
            info!("Reading thread history from {}", manifest.spec.mail.endpoint);
            Arc::new(HttpMailClient::new(&manifest.spec.mail)?)
        }
    };

    let mut service = CompileService::new(source, manifest.spec.clone());
    if publish {
        service = service.with_publisher(Arc::new(HttpMailClient::new(&manifest.spec.mail)?));
    }
    Ok(service)
}

async fn compile(
    manifest: &ToolkitConfigManifest,
    thread: &str,
    messages: Option<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
    publish: bool,
) -> Result<()> {
    let service = build_service(manifest, messages, publish)?;
    let outcome = service.compile_thread(thread).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    let rendered = match &outcome.merge {
        MergeOutcome::Merged { rendered, .. } => rendered,
        MergeOutcome::Failed { failure } => {
            anyhow::bail!("Merge failed for thread {}: {}", thread, failure);
        }
    };

    match &output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write artifact to {:?}", path))?;
            eprintln!("{}", format!("✓ Artifact written: {}", path.display()).green());
        }
        None if !json => print!("{}", rendered),
        None => {}
    }

    if publish {
        if !outcome.publishable() {
            anyhow::bail!("Lint errors present; artifact for thread {} was not published", thread);
        }
        let id = service.publish(&outcome).await?;
        eprintln!("{}", format!("✓ Artifact published as message {}", id).green());
    }

    Ok(())
}

async fn lint(manifest: &ToolkitConfigManifest, thread: &str, messages: Option<PathBuf>, json: bool) -> Result<()> {
    let service = build_service(manifest, messages, false)?;
    let outcome = service.compile_thread(thread).await?;

    let report = match &outcome.merge {
        MergeOutcome::Merged { lint, .. } => lint,
        MergeOutcome::Failed { failure } => {
            anyhow::bail!("Merge failed for thread {}: {}", thread, failure);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_lint(report);
    }

    if !report.valid {
        anyhow::bail!("Artifact for thread {} failed lint", thread);
    }
    Ok(())
}

/// Human-readable compile summary on stderr.
fn print_summary(outcome: &CompileOutcome) {
    eprintln!("{}", format!("Thread {}", outcome.thread_id).bold());
    eprintln!(
        "  Messages scanned: {}  Delta blocks: {}  Rejected: {}",
        outcome.parse.messages_scanned,
        outcome.parse.blocks_found,
        outcome.parse.rejected.len()
    );
    for invalid in &outcome.parse.rejected {
        eprintln!(
            "    {} message {} block {} ({}): {}",
            "✗".red(),
            invalid.origin.message_id,
            invalid.origin.block_index,
            invalid.agent,
            invalid.reason
        );
    }

    match &outcome.merge {
        MergeOutcome::Merged {
            report, lint, digest, ..
        } => {
            eprintln!(
                "  Version: {}  Applied: {}  Skipped: {}  No-ops: {}",
                report.artifact.version, report.applied, report.skipped, report.noops
            );
            for warning in &report.warnings {
                eprintln!("    {} {}", "!".yellow(), warning);
            }
            eprintln!("  Digest: {}", digest.dimmed());
            print_lint(lint);
        }
        MergeOutcome::Failed { failure } => {
            eprintln!("  {}", "Merge failed:".red().bold());
            for error in &failure.errors {
                eprintln!("    {} {}", "✗".red(), error);
            }
        }
    }
}

fn print_lint(report: &LintReport) {
    if report.issues.is_empty() {
        eprintln!("{}", "✓ Lint clean".green());
        return;
    }
    for issue in &report.issues {
        let line = issue.to_string();
        match issue.severity {
            Severity::Error => eprintln!("  {}", line.red()),
            Severity::Warning => eprintln!("  {}", line.yellow()),
        }
    }
    if report.valid {
        eprintln!("{}", "✓ Lint passed with warnings".green());
    } else {
        eprintln!("{}", format!("✗ Lint failed: {} error(s)", report.errors().count()).red());
    }
}
