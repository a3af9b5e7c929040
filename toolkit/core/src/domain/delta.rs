// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Delta Domain Types
//!
//! A [`Delta`] is one proposed change to the artifact, extracted from a
//! message body. Deltas are immutable: the merge engine either applies or
//! rejects them, it never rewrites them.
//!
//! Delta ids are UUID v5 values derived from the originating message id and
//! block index, so parsing the same message history twice yields the same ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::fields::{ReplaceFields, SectionFields};
use crate::domain::section::{ItemId, Section};

/// Namespace for deterministic delta ids.
const DELTA_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b8e_4a53_4d0b_9c7e_1f2a_3b4c_5d6e);

/// Unique identifier for a [`Delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeltaId(pub Uuid);

impl DeltaId {
    /// Deterministic id for block `block_index` of message `message_id`.
    pub fn derive(message_id: i64, block_index: usize) -> Self {
        let name = format!("message:{}#block:{}", message_id, block_index);
        Self(Uuid::new_v5(&DELTA_NAMESPACE, name.as_bytes()))
    }

    /// Random id, for deltas built outside a message history.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeltaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operation kind as written in a delta block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Add,
    Edit,
    Kill,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "ADD",
            OperationKind::Edit => "EDIT",
            OperationKind::Kill => "KILL",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    /// Case-insensitive: `add`, `Add` and `ADD` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(OperationKind::Add),
            "EDIT" => Ok(OperationKind::Edit),
            "KILL" => Ok(OperationKind::Kill),
            _ => Err(s.to_string()),
        }
    }
}

/// The validated operation carried by a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum DeltaOp {
    /// Create a new item; the merge engine assigns its id.
    Add { fields: SectionFields },
    /// Patch an existing live item.
    Edit {
        target: ItemId,
        fields: SectionFields,
        #[serde(default, skip_serializing_if = "ReplaceFields::is_empty")]
        replace: ReplaceFields,
    },
    /// Soft-delete an item.
    Kill {
        target: ItemId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl DeltaOp {
    pub fn kind(&self) -> OperationKind {
        match self {
            DeltaOp::Add { .. } => OperationKind::Add,
            DeltaOp::Edit { .. } => OperationKind::Edit,
            DeltaOp::Kill { .. } => OperationKind::Kill,
        }
    }

    pub fn target(&self) -> Option<ItemId> {
        match self {
            DeltaOp::Add { .. } => None,
            DeltaOp::Edit { target, .. } | DeltaOp::Kill { target, .. } => Some(*target),
        }
    }
}

/// Where a delta block came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaOrigin {
    pub message_id: i64,
    /// Zero-based index of the block within its message.
    pub block_index: usize,
    /// One-based line of the opening fence within the message body.
    pub line: usize,
}

impl fmt::Display for DeltaOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message {} block {} (line {})",
            self.message_id, self.block_index, self.line
        )
    }
}

/// A well-formed, attributed, timestamped proposed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub id: DeltaId,
    pub timestamp: DateTime<Utc>,
    /// Contributing agent name.
    pub agent: String,
    pub section: Section,
    #[serde(flatten)]
    pub op: DeltaOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<DeltaOrigin>,
}

impl Delta {
    pub fn new(
        agent: impl Into<String>,
        timestamp: DateTime<Utc>,
        section: Section,
        op: DeltaOp,
    ) -> Self {
        Self {
            id: DeltaId::new(),
            timestamp,
            agent: agent.into(),
            section,
            op,
            rationale: None,
            origin: None,
        }
    }

    pub fn add(agent: impl Into<String>, timestamp: DateTime<Utc>, fields: SectionFields) -> Self {
        let section = fields.section();
        Self::new(agent, timestamp, section, DeltaOp::Add { fields })
    }

    pub fn edit(
        agent: impl Into<String>,
        timestamp: DateTime<Utc>,
        target: ItemId,
        fields: SectionFields,
    ) -> Self {
        Self::new(
            agent,
            timestamp,
            target.section(),
            DeltaOp::Edit {
                target,
                fields,
                replace: ReplaceFields::new(),
            },
        )
    }

    pub fn kill(
        agent: impl Into<String>,
        timestamp: DateTime<Utc>,
        target: ItemId,
        reason: Option<String>,
    ) -> Self {
        Self::new(agent, timestamp, target.section(), DeltaOp::Kill { target, reason })
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_replace(mut self, fields: &[&str]) -> Self {
        if let DeltaOp::Edit { replace, .. } = &mut self.op {
            replace.extend(fields.iter().map(|f| f.to_string()));
        }
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.op.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delta_id_is_deterministic() {
        assert_eq!(DeltaId::derive(42, 0), DeltaId::derive(42, 0));
        assert_ne!(DeltaId::derive(42, 0), DeltaId::derive(42, 1));
        assert_ne!(DeltaId::derive(42, 0), DeltaId::derive(43, 0));
    }

    #[test]
    fn test_operation_kind_parse_is_case_insensitive() {
        assert_eq!("add".parse::<OperationKind>().unwrap(), OperationKind::Add);
        assert_eq!("Edit".parse::<OperationKind>().unwrap(), OperationKind::Edit);
        assert_eq!("KILL".parse::<OperationKind>().unwrap(), OperationKind::Kill);
        assert_eq!("MOVE".parse::<OperationKind>().unwrap_err(), "MOVE");
    }

    #[test]
    fn test_constructors_derive_section_from_target() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let target: ItemId = "T2".parse().unwrap();
        let kill = Delta::kill("GreenCastle", ts, target, Some("confounded".into()));
        assert_eq!(kill.section, Section::DiscriminativeTests);
        assert_eq!(kill.kind(), OperationKind::Kill);
        assert_eq!(kill.op.target(), Some(target));
    }

    #[test]
    fn test_with_replace_only_affects_edits() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let target: ItemId = "H1".parse().unwrap();
        let edit = Delta::edit("a", ts, target, SectionFields::empty(Section::HypothesisSlate))
            .with_replace(&["anchors"]);
        match &edit.op {
            DeltaOp::Edit { replace, .. } => assert!(replace.contains("anchors")),
            _ => panic!("expected edit"),
        }
    }
}
