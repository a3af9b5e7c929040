// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Artifact Aggregate
//!
//! The [`Artifact`] is the versioned, multi-section document folded from a
//! thread's delta history. It is a value, not a store: every compile rebuilds
//! it from an empty base, so two compiles of the same history are equal.
//!
//! # Invariants
//!
//! - Item ids are unique within a section and never reused; each section keeps
//!   its own `last_assigned` counter, which only grows.
//! - Items are never removed. KILL flips an item to [`ItemStatus::Killed`].
//! - `created_at` / `updated_at` come from applied delta timestamps, never the
//!   wall clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::delta::DeltaId;
use crate::domain::fields::SectionFields;
use crate::domain::section::{ItemId, Section};

/// Schema identifier stamped on every artifact.
pub const ARTIFACT_SCHEMA_VERSION: &str = "artifact/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Active,
    Closed,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::Active => f.write_str("active"),
            ArtifactStatus::Closed => f.write_str("closed"),
        }
    }
}

/// Audit record of the delta that killed an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub killed_by: String,
    pub killed_at: DateTime<Utc>,
    pub delta_id: DeltaId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ItemStatus {
    Alive,
    Killed(KillRecord),
}

/// Who created and last touched an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProvenance {
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_at: Option<DateTime<Utc>>,
    /// Number of EDITs applied since creation.
    #[serde(default)]
    pub revisions: u32,
}

/// One addressable entry within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub fields: SectionFields,
    pub status: ItemStatus,
    pub provenance: ItemProvenance,
}

impl Item {
    pub fn is_alive(&self) -> bool {
        matches!(self.status, ItemStatus::Alive)
    }

    pub fn kill_record(&self) -> Option<&KillRecord> {
        match &self.status {
            ItemStatus::Killed(record) => Some(record),
            ItemStatus::Alive => None,
        }
    }
}

/// Items of one section plus its id counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionState {
    /// Number of the last id handed out; the next ADD gets `last_assigned + 1`.
    pub last_assigned: u32,
    /// Items in assignment order.
    pub items: Vec<Item>,
}

impl SectionState {
    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn live(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.is_alive())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }
}

/// The merged research document for one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub schema_version: String,
    pub thread_id: String,
    pub version: u32,
    pub status: ArtifactStatus,
    pub sections: BTreeMap<Section, SectionState>,
    pub contributors: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Artifact {
    /// Empty artifact at version 0 with every section present.
    pub fn empty(thread_id: impl Into<String>) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            thread_id: thread_id.into(),
            version: 0,
            status: ArtifactStatus::Active,
            sections: Section::ALL
                .into_iter()
                .map(|section| (section, SectionState::default()))
                .collect(),
            contributors: BTreeSet::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Empty artifact that continues from `version` earlier published merges.
    pub fn at_version(thread_id: impl Into<String>, version: u32) -> Self {
        Self {
            version,
            ..Self::empty(thread_id)
        }
    }

    pub fn section(&self, section: Section) -> Option<&SectionState> {
        self.sections.get(&section)
    }

    pub fn section_mut(&mut self, section: Section) -> &mut SectionState {
        self.sections.entry(section).or_default()
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.section(id.section()).and_then(|s| s.get(id))
    }

    /// Items of `section` in id order; empty when the section is absent.
    pub fn items(&self, section: Section) -> &[Item] {
        self.section(section).map(|s| s.items.as_slice()).unwrap_or(&[])
    }

    pub fn live_count(&self, section: Section) -> usize {
        self.section(section).map(SectionState::live_count).unwrap_or(0)
    }

    pub fn total_items(&self) -> usize {
        self.sections.values().map(|s| s.items.len()).sum()
    }
}
