// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Merge Engine
//!
//! Deterministic fold of a delta history onto a base [`Artifact`].
//!
//! The engine is a pure, synchronous function: concurrency between agents is
//! resolved upstream by the mail service, which hands us a single ordered
//! history. Replaying the same history always yields an equal artifact.
//!
//! # Ordering
//!
//! Deltas are stably sorted by timestamp. Deltas with equal timestamps keep
//! their input order, which is the message store's arrival order.
//!
//! # Failure model
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | section at its live-item limit, required field absent, unknown/killed target | delta skipped, [`MergeWarning`] recorded |
//! | repeated KILL | counted as a no-op |
//! | corrupt base, id counter overflow, payload/section mismatch | whole merge fails with [`MergeFailure`] |

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::domain::artifact::{Artifact, Item, ItemProvenance, ItemStatus, KillRecord};
use crate::domain::config::MergePolicy;
use crate::domain::delta::{Delta, DeltaId, DeltaOp, OperationKind};
use crate::domain::fields::{FieldsMismatch, ReplaceFields, SectionFields};
use crate::domain::section::{ItemId, Section};

// ============================================================================
// Report types
// ============================================================================

/// Why a single delta was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    SectionLimitExceeded,
    MissingRequiredField,
    InvalidTarget,
    TargetKilled,
}

impl RejectionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCode::SectionLimitExceeded => "SECTION_LIMIT_EXCEEDED",
            RejectionCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            RejectionCode::InvalidTarget => "INVALID_TARGET",
            RejectionCode::TargetKilled => "TARGET_KILLED",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A skipped delta, with enough context to tell its author what to resend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWarning {
    pub code: RejectionCode,
    pub delta_id: DeltaId,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub section: Section,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ItemId>,
    pub message: String,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} by {}", self.code, self.operation, self.agent)?;
        if let Some(target) = self.target {
            write!(f, " on {}", target)?;
        }
        write!(f, " ({})", self.message)
    }
}

/// Successful merge result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub artifact: Artifact,
    pub applied: usize,
    pub skipped: usize,
    /// Repeated KILLs of an already-killed item.
    pub noops: usize,
    pub warnings: Vec<MergeWarning>,
}

/// Structural violation that makes the whole merge meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum MergeError {
    #[error("duplicate item id {id} in base artifact")]
    DuplicateItemId { id: ItemId },

    #[error("item {id} is stored under section {section}")]
    MisplacedItem { id: ItemId, section: Section },

    #[error("item {id} exceeds section counter {last_assigned}")]
    IdAboveCounter { id: ItemId, last_assigned: u32 },

    #[error("item {id} carries fields of section {fields}")]
    ItemFieldsMismatch { id: ItemId, fields: Section },

    #[error("id counter overflow in section {section}")]
    CounterOverflow { section: Section },

    #[error("delta {delta_id} targets {section} but carries {fields} fields")]
    DeltaSectionMismatch {
        delta_id: DeltaId,
        section: Section,
        fields: Section,
    },
}

impl MergeError {
    fn from_fields(delta_id: DeltaId, mismatch: FieldsMismatch) -> Self {
        MergeError::DeltaSectionMismatch {
            delta_id,
            section: mismatch.target,
            fields: mismatch.patch,
        }
    }
}

/// Failed merge: no artifact is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("merge failed with {} error(s)", .errors.len())]
pub struct MergeFailure {
    pub errors: Vec<MergeError>,
    /// Warnings collected before the failure.
    pub warnings: Vec<MergeWarning>,
}

// ============================================================================
// Engine
// ============================================================================

enum Applied {
    Yes,
    NoOp,
    Skipped(MergeWarning),
}

/// Fold `deltas` onto `base` under `policy`.
pub fn merge(base: &Artifact, deltas: &[Delta], policy: &MergePolicy) -> Result<MergeReport, MergeFailure> {
    let errors = check_base(base);
    if !errors.is_empty() {
        tracing::error!(thread = %base.thread_id, errors = errors.len(), "Base artifact is inconsistent");
        return Err(MergeFailure {
            errors,
            warnings: Vec::new(),
        });
    }

    let mut ordered: Vec<&Delta> = deltas.iter().collect();
    // Vec::sort_by_key is stable; ties keep arrival order.
    ordered.sort_by_key(|d| d.timestamp);

    let mut artifact = base.clone();
    let mut applied_agents: BTreeSet<String> = BTreeSet::new();
    let mut warnings = Vec::new();
    let (mut applied, mut skipped, mut noops) = (0usize, 0usize, 0usize);

    for delta in ordered {
        let outcome = match apply(&mut artifact, delta, policy) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(delta = %delta.id, agent = %delta.agent, "Merge aborted: {}", error);
                return Err(MergeFailure {
                    errors: vec![error],
                    warnings,
                });
            }
        };

        match outcome {
            Applied::Yes => {
                tracing::debug!(
                    delta = %delta.id,
                    agent = %delta.agent,
                    operation = %delta.kind(),
                    section = %delta.section,
                    "Applied delta"
                );
                applied += 1;
                applied_agents.insert(delta.agent.clone());
                artifact.created_at = Some(artifact.created_at.map_or(delta.timestamp, |t| t.min(delta.timestamp)));
                artifact.updated_at = Some(artifact.updated_at.map_or(delta.timestamp, |t| t.max(delta.timestamp)));
            }
            Applied::NoOp => {
                tracing::debug!(delta = %delta.id, "Repeated KILL is a no-op");
                noops += 1;
            }
            Applied::Skipped(warning) => {
                tracing::warn!(delta = %delta.id, "Skipped delta: {}", warning);
                skipped += 1;
                warnings.push(warning);
            }
        }
    }

    artifact.contributors.extend(applied_agents);
    artifact.version = base.version.saturating_add(1);

    metrics::counter!("tessera_deltas_applied_total").increment(applied as u64);
    metrics::counter!("tessera_deltas_skipped_total").increment(skipped as u64);
    metrics::counter!("tessera_deltas_noop_total").increment(noops as u64);

    tracing::info!(
        thread = %artifact.thread_id,
        version = artifact.version,
        applied,
        skipped,
        noops,
        "Merged delta history"
    );

    Ok(MergeReport {
        artifact,
        applied,
        skipped,
        noops,
        warnings,
    })
}

fn apply(artifact: &mut Artifact, delta: &Delta, policy: &MergePolicy) -> Result<Applied, MergeError> {
    if let Some(target) = delta.op.target() {
        if target.section() != delta.section {
            return Err(MergeError::DeltaSectionMismatch {
                delta_id: delta.id,
                section: delta.section,
                fields: target.section(),
            });
        }
    }

    match &delta.op {
        DeltaOp::Add { fields } => apply_add(artifact, delta, fields, policy),
        DeltaOp::Edit { target, fields, replace } => apply_edit(artifact, delta, *target, fields, replace),
        DeltaOp::Kill { target, reason } => Ok(apply_kill(artifact, delta, *target, reason)),
    }
}

fn apply_add(
    artifact: &mut Artifact,
    delta: &Delta,
    fields: &SectionFields,
    policy: &MergePolicy,
) -> Result<Applied, MergeError> {
    if fields.section() != delta.section {
        return Err(MergeError::DeltaSectionMismatch {
            delta_id: delta.id,
            section: delta.section,
            fields: fields.section(),
        });
    }

    let state = artifact.section_mut(delta.section);

    if let Some(limit) = policy.limit(delta.section) {
        if state.live_count() >= limit {
            return Ok(Applied::Skipped(warning(
                delta,
                RejectionCode::SectionLimitExceeded,
                format!("section {} is at its limit of {} live items", delta.section, limit),
            )));
        }
    }

    if let Some(field) = fields.missing_required_field() {
        return Ok(Applied::Skipped(warning(
            delta,
            RejectionCode::MissingRequiredField,
            format!("ADD to {} requires '{}'", delta.section, field),
        )));
    }

    let number = state
        .last_assigned
        .checked_add(1)
        .ok_or(MergeError::CounterOverflow { section: delta.section })?;
    let id = ItemId::new(delta.section, number).map_err(|_| MergeError::CounterOverflow { section: delta.section })?;
    state.last_assigned = number;
    state.items.push(Item {
        id,
        fields: fields.clone(),
        status: ItemStatus::Alive,
        provenance: ItemProvenance {
            added_by: delta.agent.clone(),
            added_at: delta.timestamp,
            last_edited_by: None,
            last_edited_at: None,
            revisions: 0,
        },
    });
    Ok(Applied::Yes)
}

fn apply_edit(
    artifact: &mut Artifact,
    delta: &Delta,
    target: ItemId,
    fields: &SectionFields,
    replace: &ReplaceFields,
) -> Result<Applied, MergeError> {
    let Some(item) = artifact.section_mut(delta.section).get_mut(&target) else {
        return Ok(Applied::Skipped(warning(
            delta,
            RejectionCode::InvalidTarget,
            format!("item {} does not exist", target),
        )));
    };

    if let Some(record) = item.kill_record() {
        let message = format!("item {} was killed by {} at {}", target, record.killed_by, record.killed_at);
        return Ok(Applied::Skipped(warning(delta, RejectionCode::TargetKilled, message)));
    }

    item.fields
        .apply_patch(fields.clone(), replace)
        .map_err(|mismatch| MergeError::from_fields(delta.id, mismatch))?;
    item.provenance.last_edited_by = Some(delta.agent.clone());
    item.provenance.last_edited_at = Some(delta.timestamp);
    item.provenance.revisions += 1;
    Ok(Applied::Yes)
}

fn apply_kill(artifact: &mut Artifact, delta: &Delta, target: ItemId, reason: &Option<String>) -> Applied {
    let Some(item) = artifact.section_mut(delta.section).get_mut(&target) else {
        return Applied::Skipped(warning(
            delta,
            RejectionCode::InvalidTarget,
            format!("item {} does not exist", target),
        ));
    };

    if !item.is_alive() {
        return Applied::NoOp;
    }

    item.status = ItemStatus::Killed(KillRecord {
        reason: reason.clone(),
        killed_by: delta.agent.clone(),
        killed_at: delta.timestamp,
        delta_id: delta.id,
    });
    Applied::Yes
}

fn warning(delta: &Delta, code: RejectionCode, message: String) -> MergeWarning {
    MergeWarning {
        code,
        delta_id: delta.id,
        agent: delta.agent.clone(),
        timestamp: delta.timestamp,
        operation: delta.kind(),
        section: delta.section,
        target: delta.op.target(),
        message,
    }
}

/// Structural checks on a base artifact before anything is replayed onto it.
fn check_base(base: &Artifact) -> Vec<MergeError> {
    let mut errors = Vec::new();

    for (section, state) in &base.sections {
        let mut seen = BTreeSet::new();
        for item in &state.items {
            if item.id.section() != *section {
                errors.push(MergeError::MisplacedItem {
                    id: item.id,
                    section: *section,
                });
            }
            if item.fields.section() != *section {
                errors.push(MergeError::ItemFieldsMismatch {
                    id: item.id,
                    fields: item.fields.section(),
                });
            }
            if !seen.insert(item.id) {
                errors.push(MergeError::DuplicateItemId { id: item.id });
            }
            if item.id.number() > state.last_assigned {
                errors.push(MergeError::IdAboveCounter {
                    id: item.id,
                    last_assigned: state.last_assigned,
                });
            }
        }
    }

    errors
}
