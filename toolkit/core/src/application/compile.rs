// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compile Pipeline
//!
//! Drives parse → merge → lint → render for one thread. Every compile replays
//! the full message history onto an empty base; nothing is carried between
//! compiles except the version number, which is derived from how many
//! artifacts were already published to the thread.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::application::lint::{lint_with, LintReport};
use crate::application::merge::{merge, MergeFailure, MergeReport};
use crate::domain::artifact::Artifact;
use crate::domain::config::ToolkitConfigSpec;
use crate::domain::message::{MessagePublisher, MessageSource, ThreadMessage};
use crate::infrastructure::delta_parser::{DeltaParser, ParseReport};
use crate::presentation::renderer::{find_marker, render};

/// Everything one compile produced.
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutcome {
    pub thread_id: String,
    pub base_version: u32,
    pub parse: ParseReport,
    #[serde(flatten)]
    pub merge: MergeOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MergeOutcome {
    Merged {
        report: MergeReport,
        lint: LintReport,
        rendered: String,
        /// SHA-256 of `rendered`, hex encoded.
        digest: String,
    },
    Failed { failure: MergeFailure },
}

impl CompileOutcome {
    /// Merge succeeded and lint found no errors.
    pub fn publishable(&self) -> bool {
        matches!(&self.merge, MergeOutcome::Merged { lint, .. } if lint.valid)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.merge {
            MergeOutcome::Merged { report, .. } => Some(&report.artifact),
            MergeOutcome::Failed { .. } => None,
        }
    }

    pub fn rendered(&self) -> Option<&str> {
        match &self.merge {
            MergeOutcome::Merged { rendered, .. } => Some(rendered),
            MergeOutcome::Failed { .. } => None,
        }
    }

    pub fn digest(&self) -> Option<&str> {
        match &self.merge {
            MergeOutcome::Merged { digest, .. } => Some(digest),
            MergeOutcome::Failed { .. } => None,
        }
    }

    pub fn lint(&self) -> Option<&LintReport> {
        match &self.merge {
            MergeOutcome::Merged { lint, .. } => Some(lint),
            MergeOutcome::Failed { .. } => None,
        }
    }
}

/// Number of artifacts for `thread_id` already published in `messages`.
pub fn count_published(thread_id: &str, messages: &[ThreadMessage]) -> u32 {
    let count = messages
        .iter()
        .filter_map(|m| find_marker(&m.body))
        .filter(|marker| marker.thread_id == thread_id)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compile `messages` (in message-store order) into an artifact.
pub fn compile(
    thread_id: &str,
    messages: &[ThreadMessage],
    base_version: u32,
    spec: &ToolkitConfigSpec,
) -> CompileOutcome {
    let parse = DeltaParser::parse_history(messages);
    let base = Artifact::at_version(thread_id, base_version);

    let merge = match merge(&base, &parse.deltas, &spec.merge) {
        Ok(report) => {
            let lint = lint_with(&report.artifact, &spec.lint, &spec.merge);
            let rendered = render(&report.artifact);
            let digest = content_digest(&rendered);
            tracing::info!(
                thread = %thread_id,
                version = report.artifact.version,
                applied = report.applied,
                skipped = report.skipped,
                rejected = parse.rejected.len(),
                valid = lint.valid,
                digest = %digest,
                "Compiled artifact"
            );
            MergeOutcome::Merged {
                report,
                lint,
                rendered,
                digest,
            }
        }
        Err(failure) => {
            tracing::error!(thread = %thread_id, "Compile failed: {}", failure);
            MergeOutcome::Failed { failure }
        }
    };

    CompileOutcome {
        thread_id: thread_id.to_string(),
        base_version,
        parse,
        merge,
    }
}

/// Fetches a thread, compiles it and optionally republishes the result.
pub struct CompileService {
    source: Arc<dyn MessageSource>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    spec: ToolkitConfigSpec,
}

impl CompileService {
    pub fn new(source: Arc<dyn MessageSource>, spec: ToolkitConfigSpec) -> Self {
        Self {
            source,
            publisher: None,
            spec,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub async fn compile_thread(&self, thread_id: &str) -> Result<CompileOutcome> {
        let messages = self
            .source
            .fetch_thread(thread_id)
            .await
            .with_context(|| format!("Failed to fetch thread {}", thread_id))?;
        let base_version = count_published(thread_id, &messages);
        tracing::debug!(
            thread = %thread_id,
            messages = messages.len(),
            base_version,
            "Fetched thread history"
        );
        Ok(compile(thread_id, &messages, base_version, &self.spec))
    }

    /// Post the rendered artifact back to its thread.
    pub async fn publish(&self, outcome: &CompileOutcome) -> Result<i64> {
        let publisher = self
            .publisher
            .as_ref()
            .ok_or_else(|| anyhow!("No message publisher configured"))?;
        if !outcome.publishable() {
            return Err(anyhow!(
                "Artifact for thread {} is not publishable (merge failed or lint errors present)",
                outcome.thread_id
            ));
        }
        let (Some(artifact), Some(rendered)) = (outcome.artifact(), outcome.rendered()) else {
            return Err(anyhow!("Compile outcome has no rendered artifact"));
        };

        let subject = format!("[artifact] {} v{}", artifact.thread_id, artifact.version);
        let id = publisher
            .publish(&outcome.thread_id, &subject, rendered)
            .await
            .with_context(|| format!("Failed to publish artifact for thread {}", outcome.thread_id))?;
        tracing::info!(thread = %outcome.thread_id, message_id = id, version = artifact.version, "Published artifact");
        Ok(id)
    }
}
