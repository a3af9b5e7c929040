// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Markdown Renderer
//!
//! Deterministic serialization of an [`Artifact`] to markdown. The output
//! depends only on the artifact value: sections render in canonical order,
//! items in id order, maps in key order, and the only timestamps printed are
//! the ones stored on the artifact.
//!
//! The header carries a machine-readable marker comment
//! (`<!-- tessera:artifact thread="..." version=... schema=... -->`) so that
//! published artifacts can be recognised in a message history.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::artifact::{Artifact, Item, ItemProvenance, KillRecord};
use crate::domain::fields::{SectionFields, TestScore};
use crate::domain::section::{ItemId, Section};

const MARKER_OPEN: &str = "<!-- tessera:artifact ";
const MARKER_CLOSE: &str = " -->";
const NO_ENTRIES: &str = "_No entries._";

/// Identity fields recovered from a rendered artifact's marker comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMarker {
    pub thread_id: String,
    pub version: u32,
    pub schema: String,
}

/// Marker comment for `artifact`.
///
/// The thread id is written as a JSON string with `<` and `>` escaped, so any
/// id (spaces, quotes, `-->`) survives inside the comment.
pub fn marker(artifact: &Artifact) -> String {
    format!(
        "{}thread={} version={} schema={}{}",
        MARKER_OPEN,
        encode_thread_id(&artifact.thread_id),
        artifact.version,
        artifact.schema_version,
        MARKER_CLOSE
    )
}

fn encode_thread_id(thread_id: &str) -> String {
    Value::String(thread_id.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

/// Split a leading JSON string off `text`, returning it decoded with the rest.
fn decode_thread_id(text: &str) -> Option<(String, &str)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<String>();
    let thread_id = stream.next()?.ok()?;
    let rest = text.get(stream.byte_offset()..)?;
    Some((thread_id, rest))
}

/// Find the first artifact marker in `text`.
pub fn find_marker(text: &str) -> Option<ArtifactMarker> {
    text.lines().find_map(|line| {
        let inner = line.trim().strip_prefix(MARKER_OPEN)?.strip_suffix(MARKER_CLOSE)?;
        let (thread_id, rest) = decode_thread_id(inner.strip_prefix("thread=")?)?;
        let mut version = None;
        let mut schema = None;
        for pair in rest.split_whitespace() {
            match pair.split_once('=') {
                Some(("version", v)) => version = v.parse().ok(),
                Some(("schema", v)) => schema = Some(v.to_string()),
                _ => {}
            }
        }
        Some(ArtifactMarker {
            thread_id,
            version: version?,
            schema: schema?,
        })
    })
}

/// Render `artifact` as markdown.
pub fn render(artifact: &Artifact) -> String {
    let mut out = Vec::new();

    out.push(format!("# Research Artifact: {}", single_line(&artifact.thread_id)));
    out.push(String::new());
    out.push(marker(artifact));
    out.push(String::new());
    out.push(format!("- **Version:** {}", artifact.version));
    out.push(format!("- **Status:** {}", artifact.status));
    let contributors = if artifact.contributors.is_empty() {
        "_none_".to_string()
    } else {
        artifact.contributors.iter().map(|c| single_line(c)).collect::<Vec<_>>().join(", ")
    };
    out.push(format!("- **Contributors:** {}", contributors));
    out.push(format!("- **Created:** {}", optional_timestamp(artifact.created_at)));
    out.push(format!("- **Updated:** {}", optional_timestamp(artifact.updated_at)));

    for (index, section) in Section::ALL.into_iter().enumerate() {
        out.push(String::new());
        out.push(format!("## {}. {}", index + 1, section.title()));
        out.push(String::new());

        let items = artifact.items(section);
        if items.is_empty() {
            out.push(NO_ENTRIES.to_string());
        } else if section == Section::PredictionsTable {
            render_predictions(items, &mut out);
        } else {
            render_items(items, &mut out);
        }
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn render_items(items: &[Item], out: &mut Vec<String>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(String::new());
        }
        let heading = match label(&item.fields) {
            Some(label) => format!("{}: {}", item.id, single_line(label)),
            None => item.id.to_string(),
        };
        match item.kill_record() {
            Some(record) => {
                out.push(format!("### ~~{}~~", struck(&heading)));
                out.push(String::new());
                out.push(format!("> {}", kill_note(record)));
                out.push(String::new());
            }
            None => {
                out.push(format!("### {}", heading));
                out.push(String::new());
            }
        }

        for (name, value) in field_lines(&item.fields) {
            out.push(format!("- **{}:** {}", name, value));
        }
        for (key, value) in item.fields.extra() {
            out.push(format!("- **{}:** `{}`", single_line(key), compact(value)));
        }
        out.push(String::new());
        out.push(provenance_note(&item.provenance));
    }
}

fn render_predictions(items: &[Item], out: &mut Vec<String>) {
    let columns = prediction_columns(items);

    let mut header = vec!["ID".to_string(), "Condition".to_string()];
    header.extend(columns.iter().map(|c| cell(c)));
    header.push("Anchors".to_string());
    header.push("Status".to_string());
    out.push(format!("| {} |", header.join(" | ")));
    out.push(format!("|{}|", vec!["---"; header.len()].join("|")));

    let mut notes = Vec::new();
    for item in items {
        let SectionFields::PredictionsTable(fields) = &item.fields else { continue };

        let condition = cell(fields.condition.as_deref().unwrap_or(""));
        let (id, condition, status) = match item.kill_record() {
            Some(record) => (
                format!("~~{}~~", item.id),
                if condition.is_empty() { condition } else { format!("~~{}~~", struck(&condition)) },
                cell(&kill_note(record)),
            ),
            None => (item.id.to_string(), condition, "live".to_string()),
        };

        let mut row = vec![id, condition];
        row.extend(
            columns
                .iter()
                .map(|c| fields.outcomes.get(c).map(|o| cell(o)).unwrap_or_default()),
        );
        row.push(cell(&fields.anchors.join(", ")));
        row.push(status);
        out.push(format!("| {} |", row.join(" | ")));

        for (key, value) in &fields.extra {
            notes.push(format!("- **{}** {}: `{}`", item.id, single_line(key), compact(value)));
        }
    }

    if !notes.is_empty() {
        out.push(String::new());
        out.extend(notes);
    }
}

/// Union of outcome keys; hypothesis ids first by number, anything else after
/// in string order.
fn prediction_columns(items: &[Item]) -> Vec<String> {
    let mut known: BTreeSet<(ItemId, String)> = BTreeSet::new();
    let mut other: BTreeSet<String> = BTreeSet::new();
    for item in items {
        if let SectionFields::PredictionsTable(fields) = &item.fields {
            for key in fields.outcomes.keys() {
                match key.parse::<ItemId>() {
                    Ok(id) if id.section() == Section::HypothesisSlate => {
                        known.insert((id, key.clone()));
                    }
                    _ => {
                        other.insert(key.clone());
                    }
                }
            }
        }
    }
    known.into_iter().map(|(_, key)| key).chain(other).collect()
}

/// Short title used in item headings.
fn label(fields: &SectionFields) -> Option<&str> {
    match fields {
        SectionFields::ResearchThread(_) | SectionFields::PredictionsTable(_) => None,
        SectionFields::HypothesisSlate(f) => f.name.as_deref(),
        SectionFields::DiscriminativeTests(f) => f.name.as_deref(),
        SectionFields::AssumptionLedger(f) => f.name.as_deref(),
        SectionFields::AnomalyRegister(f) => f.name.as_deref(),
        SectionFields::AdversarialCritique(f) => f.name.as_deref(),
    }
}

/// Populated known fields in their fixed per-section order.
fn field_lines(fields: &SectionFields) -> Vec<(&'static str, String)> {
    let mut lines = Lines::default();
    match fields {
        SectionFields::ResearchThread(f) => {
            lines.text("Statement", &f.statement);
            lines.text("Context", &f.context);
            lines.text("Why it matters", &f.why_it_matters);
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::HypothesisSlate(f) => {
            lines.text("Claim", &f.claim);
            lines.text("Mechanism", &f.mechanism);
            lines.flag("Third alternative", f.third_alternative);
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::PredictionsTable(f) => {
            lines.text("Condition", &f.condition);
            lines.map("Outcomes", f.outcomes.iter());
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::DiscriminativeTests(f) => {
            lines.text("Procedure", &f.procedure);
            lines.list("Discriminates", &f.discriminates);
            lines.map("Expected outcomes", f.expected_outcomes.iter());
            lines.text("Potency check", &f.potency_check);
            if let Some(score) = &f.score {
                lines.push("Score", score_line(score));
            }
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::AssumptionLedger(f) => {
            lines.text("Statement", &f.statement);
            lines.text("Load", &f.load);
            lines.text("Test", &f.test);
            lines.flag("Scale check", f.scale_check);
            lines.text("Calculation", &f.calculation);
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::AnomalyRegister(f) => {
            lines.text("Observation", &f.observation);
            lines.list("Conflicts with", &f.conflicts_with);
            lines.text("Quarantine status", &f.quarantine_status);
            lines.list("Anchors", &f.anchors);
        }
        SectionFields::AdversarialCritique(f) => {
            lines.text("Attack", &f.attack);
            lines.text("Evidence", &f.evidence);
            lines.text("Current status", &f.current_status);
            lines.list("Anchors", &f.anchors);
        }
    }
    lines.0
}

#[derive(Default)]
struct Lines(Vec<(&'static str, String)>);

impl Lines {
    fn push(&mut self, name: &'static str, value: String) {
        self.0.push((name, value));
    }

    fn text(&mut self, name: &'static str, value: &Option<String>) {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            self.push(name, single_line(value));
        }
    }

    fn flag(&mut self, name: &'static str, value: Option<bool>) {
        if let Some(value) = value {
            self.push(name, if value { "yes" } else { "no" }.to_string());
        }
    }

    fn list(&mut self, name: &'static str, values: &[String]) {
        if !values.is_empty() {
            self.push(name, values.iter().map(|v| single_line(v)).collect::<Vec<_>>().join(", "));
        }
    }

    fn map<'a>(&mut self, name: &'static str, entries: impl Iterator<Item = (&'a String, &'a String)>) {
        let rendered: Vec<String> = entries
            .map(|(k, v)| format!("{}: {}", single_line(k), single_line(v)))
            .collect();
        if !rendered.is_empty() {
            self.push(name, rendered.join("; "));
        }
    }
}

fn score_line(score: &TestScore) -> String {
    let axes = [
        ("likelihood_ratio", score.likelihood_ratio),
        ("cost", score.cost),
        ("speed", score.speed),
        ("ambiguity", score.ambiguity),
    ];
    let parts: Vec<String> = axes
        .iter()
        .filter_map(|(name, value)| value.map(|v| format!("{} {}", name, v)))
        .collect();
    if parts.is_empty() {
        "unscored".to_string()
    } else {
        parts.join(", ")
    }
}

fn kill_note(record: &KillRecord) -> String {
    let mut note = format!("KILLED by {} at {}", single_line(&record.killed_by), timestamp(record.killed_at));
    if let Some(reason) = record.reason.as_deref().filter(|r| !r.is_empty()) {
        note.push_str(": ");
        note.push_str(&single_line(reason));
    }
    note
}

fn provenance_note(provenance: &ItemProvenance) -> String {
    let mut note = format!(
        "_Added by {} at {}",
        single_line(&provenance.added_by),
        timestamp(provenance.added_at)
    );
    if provenance.revisions > 0 {
        note.push_str(&format!("; edited {} time(s)", provenance.revisions));
        if let (Some(by), Some(at)) = (&provenance.last_edited_by, provenance.last_edited_at) {
            note.push_str(&format!(", last by {} at {}", single_line(by), timestamp(at)));
        }
    }
    note.push_str("._");
    note
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn optional_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(timestamp).unwrap_or_else(|| "_n/a_".to_string())
}

fn compact(value: &Value) -> String {
    // Backticks would close the surrounding code span.
    value.to_string().replace('`', "'")
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", "<br>").replace('\n', "<br>")
}

fn cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

fn struck(text: &str) -> String {
    text.replace('~', "\\~")
}
