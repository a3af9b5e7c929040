// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Delta Block Parser
//!
//! Extracts delta blocks from free-form message bodies and classifies each one
//! as a valid [`Delta`] or an [`InvalidDelta`] with a specific reason.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse agent message text → Domain deltas
//! - **Anti-Corruption:** Translates the loosely-typed block format into typed
//!   `DeltaOp`/`SectionFields` values; nothing untyped reaches the merge engine
//!
//! # Block Format
//!
//! ````text
//! ```delta
//! {
//!   "operation": "EDIT",
//!   "section": "hypothesis_slate",
//!   "target_id": "H2",
//!   "payload": { "anchors": ["§103"], "replace_fields": [] },
//!   "rationale": "adds the 1961 anchor"
//! }
//! ```
//! ````
//!
//! Parsing never fails as a whole: a bad block is reported and the remaining
//! blocks of the message (and of the history) are still parsed.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::delta::{Delta, DeltaId, DeltaOp, DeltaOrigin, OperationKind};
use crate::domain::fields::{ReplaceFields, SectionFields};
use crate::domain::message::ThreadMessage;
use crate::domain::section::{ItemId, Section};

/// Fence info string that marks a delta block.
pub const DELTA_FENCE_TAG: &str = "delta";

/// Payload key listing fields an EDIT overwrites instead of merging.
pub const REPLACE_FIELDS_KEY: &str = "replace_fields";

// ============================================================================
// Results
// ============================================================================

/// Why a block was not accepted as a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseRejection {
    #[error("MALFORMED_BLOCK: {0}")]
    MalformedBlock(String),

    #[error("MISSING_REQUIRED_FIELD: {0}")]
    MissingRequiredField(String),

    #[error("UNKNOWN_OPERATION: '{0}'")]
    UnknownOperation(String),

    #[error("UNKNOWN_SECTION: '{0}'")]
    UnknownSection(String),

    #[error("INVALID_TARGET_ID: {0}")]
    InvalidTargetId(String),

    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),

    #[error("INVALID_FIELD: {0}")]
    InvalidField(String),
}

impl ParseRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ParseRejection::MalformedBlock(_) => "MALFORMED_BLOCK",
            ParseRejection::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
            ParseRejection::UnknownOperation(_) => "UNKNOWN_OPERATION",
            ParseRejection::UnknownSection(_) => "UNKNOWN_SECTION",
            ParseRejection::InvalidTargetId(_) => "INVALID_TARGET_ID",
            ParseRejection::InvalidPayload(_) => "INVALID_PAYLOAD",
            ParseRejection::InvalidField(_) => "INVALID_FIELD",
        }
    }
}

/// Marker for a block that could not be turned into a delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidDelta {
    pub origin: DeltaOrigin,
    /// Sender of the message the block came from.
    pub agent: String,
    pub reason: ParseRejection,
    /// Raw block text, for the contributor to fix and resend.
    pub raw: String,
}

/// Classification of a single block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "block", rename_all = "lowercase")]
pub enum ParsedBlock {
    Valid(Delta),
    Invalid(InvalidDelta),
}

impl ParsedBlock {
    pub fn is_valid(&self) -> bool {
        matches!(self, ParsedBlock::Valid(_))
    }
}

/// Outcome of parsing a whole message history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    /// Valid deltas in arrival order (message order, then block order).
    pub deltas: Vec<Delta>,
    pub rejected: Vec<InvalidDelta>,
    pub messages_scanned: usize,
    pub blocks_found: usize,
}

// ============================================================================
// Parser
// ============================================================================

/// A fenced delta block as found in the text, before JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawBlock {
    /// One-based line of the opening fence.
    line: usize,
    content: String,
    terminated: bool,
}

/// Delta parser (Infrastructure service)
pub struct DeltaParser;

impl DeltaParser {
    /// Parse every message of a history, in the given order.
    pub fn parse_history(messages: &[ThreadMessage]) -> ParseReport {
        let mut report = ParseReport::default();

        for message in messages {
            report.messages_scanned += 1;
            for block in Self::parse_message(message) {
                report.blocks_found += 1;
                match block {
                    ParsedBlock::Valid(delta) => report.deltas.push(delta),
                    ParsedBlock::Invalid(invalid) => {
                        tracing::warn!(
                            origin = %invalid.origin,
                            agent = %invalid.agent,
                            "Rejected delta block: {}",
                            invalid.reason
                        );
                        metrics::counter!(
                            "tessera_delta_blocks_rejected_total",
                            "code" => invalid.reason.code()
                        )
                        .increment(1);
                        report.rejected.push(invalid);
                    }
                }
            }
        }

        tracing::debug!(
            messages = report.messages_scanned,
            blocks = report.blocks_found,
            valid = report.deltas.len(),
            rejected = report.rejected.len(),
            "Parsed message history"
        );
        report
    }

    /// Parse all delta blocks of a single message.
    pub fn parse_message(message: &ThreadMessage) -> Vec<ParsedBlock> {
        Self::extract_blocks(&message.body)
            .into_iter()
            .enumerate()
            .map(|(index, block)| {
                let origin = DeltaOrigin {
                    message_id: message.id,
                    block_index: index,
                    line: block.line,
                };
                match Self::classify(&block, message, &origin) {
                    Ok(delta) => ParsedBlock::Valid(delta),
                    Err(reason) => ParsedBlock::Invalid(InvalidDelta {
                        origin,
                        agent: message.sender.clone(),
                        reason,
                        raw: block.content,
                    }),
                }
            })
            .collect()
    }

    /// Scan text for fenced blocks tagged `delta`.
    ///
    /// Other fenced blocks are skipped whole, so a `delta` fence quoted inside
    /// a markdown example is not picked up.
    fn extract_blocks(body: &str) -> Vec<RawBlock> {
        struct OpenFence {
            ticks: usize,
            is_delta: bool,
            line: usize,
            lines: Vec<String>,
        }

        let mut blocks = Vec::new();
        let mut open: Option<OpenFence> = None;

        for (index, line) in body.lines().enumerate() {
            let trimmed = line.trim();
            let ticks = trimmed.chars().take_while(|c| *c == '`').count();

            match open.as_mut() {
                Some(fence) => {
                    if ticks >= fence.ticks && trimmed[ticks..].trim().is_empty() {
                        if let Some(done) = open.take() {
                            if done.is_delta {
                                blocks.push(RawBlock {
                                    line: done.line,
                                    content: done.lines.join("\n"),
                                    terminated: true,
                                });
                            }
                        }
                    } else {
                        fence.lines.push(line.to_string());
                    }
                }
                None if ticks >= 3 => {
                    let info = trimmed[ticks..].trim();
                    open = Some(OpenFence {
                        ticks,
                        is_delta: info.eq_ignore_ascii_case(DELTA_FENCE_TAG),
                        line: index + 1,
                        lines: Vec::new(),
                    });
                }
                None => {}
            }
        }

        if let Some(fence) = open {
            if fence.is_delta {
                blocks.push(RawBlock {
                    line: fence.line,
                    content: fence.lines.join("\n"),
                    terminated: false,
                });
            }
        }

        blocks
    }

    fn classify(
        block: &RawBlock,
        message: &ThreadMessage,
        origin: &DeltaOrigin,
    ) -> Result<Delta, ParseRejection> {
        if !block.terminated {
            return Err(ParseRejection::MalformedBlock(
                "unterminated delta block".to_string(),
            ));
        }

        let value: Value = serde_json::from_str(&block.content)
            .map_err(|e| ParseRejection::MalformedBlock(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(ParseRejection::MalformedBlock("expected object".to_string()));
        };

        let operation = Self::operation(&object)?;
        let section = Self::section(&object)?;
        let target = Self::target(&object, operation, section)?;
        let rationale = Self::rationale(&object)?;
        let payload = Self::payload(&mut object, operation)?;

        let op = match (operation, target) {
            (OperationKind::Add, None) => {
                let (fields, _) = Self::fields(section, payload)?;
                DeltaOp::Add { fields }
            }
            (OperationKind::Edit, Some(target)) => {
                let (fields, replace) = Self::fields(section, payload)?;
                if fields == SectionFields::empty(section) && replace.is_empty() {
                    return Err(ParseRejection::InvalidPayload("empty".to_string()));
                }
                DeltaOp::Edit {
                    target,
                    fields,
                    replace,
                }
            }
            (OperationKind::Kill, Some(target)) => {
                let reason = Self::kill_reason(payload.as_ref())?.or_else(|| rationale.clone());
                DeltaOp::Kill { target, reason }
            }
            // `target` already enforced the ADD/EDIT/KILL target rules.
            (kind, _) => {
                return Err(ParseRejection::InvalidTargetId(format!(
                    "inconsistent target for {}",
                    kind
                )))
            }
        };

        Ok(Delta {
            id: DeltaId::derive(message.id, origin.block_index),
            timestamp: message.created_ts,
            agent: message.sender.clone(),
            section,
            op,
            rationale,
            origin: Some(origin.clone()),
        })
    }

    fn operation(object: &Map<String, Value>) -> Result<OperationKind, ParseRejection> {
        match object.get("operation") {
            None | Some(Value::Null) => Err(ParseRejection::MissingRequiredField(
                "operation".to_string(),
            )),
            Some(Value::String(raw)) => raw
                .parse::<OperationKind>()
                .map_err(ParseRejection::UnknownOperation),
            Some(other) => Err(ParseRejection::UnknownOperation(other.to_string())),
        }
    }

    fn section(object: &Map<String, Value>) -> Result<Section, ParseRejection> {
        match object.get("section") {
            None | Some(Value::Null) => Err(ParseRejection::MissingRequiredField(
                "section".to_string(),
            )),
            Some(Value::String(raw)) => raw
                .trim()
                .parse::<Section>()
                .map_err(|_| ParseRejection::UnknownSection(raw.clone())),
            Some(other) => Err(ParseRejection::UnknownSection(other.to_string())),
        }
    }

    fn target(
        object: &Map<String, Value>,
        operation: OperationKind,
        section: Section,
    ) -> Result<Option<ItemId>, ParseRejection> {
        let raw = match object.get("target_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        };

        match (operation, raw) {
            (OperationKind::Add, None) => Ok(None),
            (OperationKind::Add, Some(_)) => Err(ParseRejection::InvalidTargetId(
                "ADD must not carry a target_id".to_string(),
            )),
            (_, None) => Err(ParseRejection::MissingRequiredField(
                "target_id".to_string(),
            )),
            (_, Some(Value::String(s))) => {
                let id: ItemId = s
                    .parse()
                    .map_err(|e: crate::domain::section::ItemIdError| {
                        ParseRejection::InvalidTargetId(e.to_string())
                    })?;
                if id.section() != section {
                    return Err(ParseRejection::InvalidTargetId(format!(
                        "target_id '{}' does not belong to section {}",
                        id, section
                    )));
                }
                Ok(Some(id))
            }
            (_, Some(other)) => Err(ParseRejection::InvalidTargetId(format!(
                "target_id must be a string, got {}",
                other
            ))),
        }
    }

    fn rationale(object: &Map<String, Value>) -> Result<Option<String>, ParseRejection> {
        match object.get("rationale") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ParseRejection::InvalidField(
                "rationale must be a string".to_string(),
            )),
        }
    }

    /// Required for ADD and EDIT, optional for KILL.
    fn payload(
        object: &mut Map<String, Value>,
        operation: OperationKind,
    ) -> Result<Option<Map<String, Value>>, ParseRejection> {
        match object.remove("payload") {
            None | Some(Value::Null) => match operation {
                OperationKind::Kill => Ok(None),
                _ => Err(ParseRejection::MissingRequiredField("payload".to_string())),
            },
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(ParseRejection::InvalidPayload(format!(
                "expected object, got {}",
                json_type(&other)
            ))),
        }
    }

    fn fields(
        section: Section,
        payload: Option<Map<String, Value>>,
    ) -> Result<(SectionFields, ReplaceFields), ParseRejection> {
        let mut payload = payload.unwrap_or_default();
        let replace = match payload.remove(REPLACE_FIELDS_KEY) {
            None | Some(Value::Null) => ReplaceFields::new(),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(ParseRejection::InvalidPayload(format!(
                        "{} entries must be strings, got {}",
                        REPLACE_FIELDS_KEY,
                        json_type(&other)
                    ))),
                })
                .collect::<Result<ReplaceFields, _>>()?,
            Some(other) => {
                return Err(ParseRejection::InvalidPayload(format!(
                    "{} must be an array, got {}",
                    REPLACE_FIELDS_KEY,
                    json_type(&other)
                )))
            }
        };

        let fields = SectionFields::from_payload(section, payload)
            .map_err(|e| ParseRejection::InvalidPayload(e.to_string()))?;
        Ok((fields, replace))
    }

    fn kill_reason(payload: Option<&Map<String, Value>>) -> Result<Option<String>, ParseRejection> {
        match payload.and_then(|p| p.get("reason")) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ParseRejection::InvalidPayload(format!(
                "reason must be a string, got {}",
                json_type(other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: i64, body: &str) -> ThreadMessage {
        ThreadMessage {
            id,
            sender: "BlueLake".to_string(),
            created_ts: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            subject: None,
            thread_id: Some("RS-1".to_string()),
            body: body.to_string(),
        }
    }

    fn single(body: &str) -> ParsedBlock {
        let mut blocks = DeltaParser::parse_message(&message(1, body));
        assert_eq!(blocks.len(), 1, "expected exactly one block");
        blocks.remove(0)
    }

    fn rejection(body: &str) -> ParseRejection {
        match single(body) {
            ParsedBlock::Invalid(invalid) => invalid.reason,
            ParsedBlock::Valid(delta) => panic!("expected rejection, got {:?}", delta),
        }
    }

    // ── Block extraction ──────────────────────────────────────────────────────

    #[test]
    fn test_no_blocks_in_plain_text() {
        assert!(DeltaParser::parse_message(&message(1, "just some prose")).is_empty());
    }

    #[test]
    fn test_multiple_blocks_reported_independently() {
        let body = r#"Proposal follows.

```delta
{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "X"}}
```

and a broken one:

```delta
{"operation": "ADD", "payload": {"claim": "Y"}}
```
"#;
        let blocks = DeltaParser::parse_message(&message(9, body));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_valid());
        match &blocks[1] {
            ParsedBlock::Invalid(invalid) => {
                assert_eq!(invalid.reason.to_string(), "MISSING_REQUIRED_FIELD: section");
                assert_eq!(invalid.origin.message_id, 9);
                assert_eq!(invalid.origin.block_index, 1);
                assert_eq!(invalid.origin.line, 9);
                assert_eq!(invalid.agent, "BlueLake");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_other_fences_are_ignored() {
        let body = "```json\n{\"operation\": \"ADD\"}\n```\n````markdown\n```delta\n{}\n```\n````\n";
        assert!(DeltaParser::parse_message(&message(1, body)).is_empty());
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        let body = "```DELTA\n{\"operation\": \"KILL\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\"}\n```";
        assert!(single(body).is_valid());
    }

    #[test]
    fn test_unterminated_block() {
        let reason = rejection("```delta\n{\"operation\": \"ADD\"}\n");
        assert_eq!(reason.to_string(), "MALFORMED_BLOCK: unterminated delta block");
    }

    // ── Field validation ──────────────────────────────────────────────────────

    #[test]
    fn test_malformed_json() {
        let reason = rejection("```delta\n{operation: ADD\n```");
        assert_eq!(reason.code(), "MALFORMED_BLOCK");
    }

    #[test]
    fn test_non_object_block() {
        let reason = rejection("```delta\n[1, 2]\n```");
        assert_eq!(reason, ParseRejection::MalformedBlock("expected object".to_string()));
    }

    #[test]
    fn test_missing_and_unknown_operation() {
        let reason = rejection("```delta\n{\"section\": \"hypothesis_slate\"}\n```");
        assert_eq!(reason.to_string(), "MISSING_REQUIRED_FIELD: operation");

        let reason = rejection("```delta\n{\"operation\": \"MOVE\", \"section\": \"hypothesis_slate\"}\n```");
        assert_eq!(reason.to_string(), "UNKNOWN_OPERATION: 'MOVE'");
    }

    #[test]
    fn test_unknown_section() {
        let reason = rejection("```delta\n{\"operation\": \"ADD\", \"section\": \"xyz\", \"payload\": {}}\n```");
        assert_eq!(reason.to_string(), "UNKNOWN_SECTION: 'xyz'");
    }

    #[test]
    fn test_add_with_target_is_rejected() {
        let reason = rejection(
            "```delta\n{\"operation\": \"ADD\", \"section\": \"hypothesis_slate\", \"target_id\": \"H4\", \"payload\": {\"claim\": \"X\"}}\n```",
        );
        assert_eq!(reason.code(), "INVALID_TARGET_ID");
    }

    #[test]
    fn test_edit_without_target() {
        let reason = rejection(
            "```delta\n{\"operation\": \"EDIT\", \"section\": \"hypothesis_slate\", \"target_id\": null, \"payload\": {\"claim\": \"X\"}}\n```",
        );
        assert_eq!(reason.to_string(), "MISSING_REQUIRED_FIELD: target_id");
    }

    #[test]
    fn test_target_from_other_section() {
        let reason = rejection(
            "```delta\n{\"operation\": \"KILL\", \"section\": \"hypothesis_slate\", \"target_id\": \"T1\"}\n```",
        );
        assert_eq!(
            reason.to_string(),
            "INVALID_TARGET_ID: target_id 'T1' does not belong to section hypothesis_slate"
        );
    }

    #[test]
    fn test_missing_payload_for_add() {
        let reason = rejection("```delta\n{\"operation\": \"ADD\", \"section\": \"anomaly_register\"}\n```");
        assert_eq!(reason.to_string(), "MISSING_REQUIRED_FIELD: payload");
    }

    #[test]
    fn test_payload_type_mismatch() {
        let reason = rejection(
            "```delta\n{\"operation\": \"ADD\", \"section\": \"discriminative_tests\", \"payload\": {\"name\": \"t\", \"anchors\": \"§1\"}}\n```",
        );
        assert_eq!(reason.code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn test_empty_edit_payload() {
        let reason = rejection(
            "```delta\n{\"operation\": \"EDIT\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\", \"payload\": {}}\n```",
        );
        assert_eq!(reason, ParseRejection::InvalidPayload("empty".to_string()));
    }

    #[test]
    fn test_non_string_rationale() {
        let reason = rejection(
            "```delta\n{\"operation\": \"KILL\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\", \"rationale\": 3}\n```",
        );
        assert_eq!(reason.code(), "INVALID_FIELD");
    }

    #[test]
    fn test_non_string_target_id() {
        let reason = rejection(
            "```delta\n{\"operation\": \"EDIT\", \"section\": \"hypothesis_slate\", \"target_id\": 7, \"payload\": {\"claim\": \"X\"}}\n```",
        );
        assert_eq!(reason, ParseRejection::InvalidTargetId("target_id must be a string, got 7".to_string()));
    }

    #[test]
    fn test_non_object_payload() {
        let reason = rejection("```delta\n{\"operation\": \"ADD\", \"section\": \"hypothesis_slate\", \"payload\": \"X\"}\n```");
        assert_eq!(reason, ParseRejection::InvalidPayload("expected object, got string".to_string()));
    }

    #[test]
    fn test_replace_fields_must_be_string_array() {
        let reason = rejection(
            "```delta\n{\"operation\": \"EDIT\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\", \"payload\": {\"anchors\": [\"§1\"], \"replace_fields\": \"anchors\"}}\n```",
        );
        assert_eq!(
            reason,
            ParseRejection::InvalidPayload("replace_fields must be an array, got string".to_string())
        );

        let reason = rejection(
            "```delta\n{\"operation\": \"EDIT\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\", \"payload\": {\"anchors\": [\"§1\"], \"replace_fields\": [1]}}\n```",
        );
        assert_eq!(
            reason,
            ParseRejection::InvalidPayload("replace_fields entries must be strings, got number".to_string())
        );
    }

    #[test]
    fn test_non_string_kill_reason() {
        let reason = rejection(
            "```delta\n{\"operation\": \"KILL\", \"section\": \"hypothesis_slate\", \"target_id\": \"H1\", \"payload\": {\"reason\": 5}}\n```",
        );
        assert_eq!(reason, ParseRejection::InvalidPayload("reason must be a string, got number".to_string()));
    }

    // ── Valid deltas ──────────────────────────────────────────────────────────

    #[test]
    fn test_valid_edit_with_replace_fields() {
        let body = r#"```delta
{
  "operation": "edit",
  "section": "hypothesis_slate",
  "target_id": "H2",
  "payload": {"anchors": ["§103"], "replace_fields": ["anchors"]},
  "rationale": "tighter anchor"
}
```"#;
        let ParsedBlock::Valid(delta) = single(body) else { panic!("expected valid delta") };
        assert_eq!(delta.section, Section::HypothesisSlate);
        assert_eq!(delta.agent, "BlueLake");
        assert_eq!(delta.rationale.as_deref(), Some("tighter anchor"));
        assert_eq!(delta.id, DeltaId::derive(1, 0));
        match delta.op {
            DeltaOp::Edit { target, fields, replace } => {
                assert_eq!(target.to_string(), "H2");
                assert!(replace.contains("anchors"));
                assert!(fields.extra().is_empty());
                assert_eq!(fields.anchors(), ["§103".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kill_reason_from_payload_or_rationale() {
        let body = "```delta\n{\"operation\": \"KILL\", \"section\": \"assumption_ledger\", \"target_id\": \"A3\", \"payload\": {\"reason\": \"refuted\"}}\n```";
        let ParsedBlock::Valid(delta) = single(body) else { panic!("expected valid delta") };
        assert!(matches!(delta.op, DeltaOp::Kill { reason: Some(ref r), .. } if r == "refuted"));

        let body = "```delta\n{\"operation\": \"KILL\", \"section\": \"assumption_ledger\", \"target_id\": \"A3\", \"rationale\": \"superseded\"}\n```";
        let ParsedBlock::Valid(delta) = single(body) else { panic!("expected valid delta") };
        assert!(matches!(delta.op, DeltaOp::Kill { reason: Some(ref r), .. } if r == "superseded"));
    }

    // ── History ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_history_keeps_arrival_order() {
        let add = |claim: &str| {
            format!(
                "```delta\n{{\"operation\": \"ADD\", \"section\": \"hypothesis_slate\", \"payload\": {{\"claim\": \"{}\"}}}}\n```",
                claim
            )
        };
        let messages = vec![
            message(1, &add("first")),
            message(2, "no blocks here"),
            message(3, &format!("{}\n{}", add("second"), add("third"))),
        ];

        let report = DeltaParser::parse_history(&messages);
        assert_eq!(report.messages_scanned, 3);
        assert_eq!(report.blocks_found, 3);
        assert!(report.rejected.is_empty());
        let origins: Vec<(i64, usize)> = report
            .deltas
            .iter()
            .map(|d| {
                let o = d.origin.as_ref().unwrap();
                (o.message_id, o.block_index)
            })
            .collect();
        assert_eq!(origins, vec![(1, 0), (3, 0), (3, 1)]);
    }
}
