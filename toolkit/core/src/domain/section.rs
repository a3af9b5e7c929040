// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Artifact Sections and Item Identity
//!
//! An artifact is divided into seven fixed sections. Every item inside a
//! section is addressed by a section-scoped [`ItemId`] of the form
//! `<Prefix><N>` (e.g. `H3`, `RT1`), where `N` is assigned by the merge engine
//! at ADD time and never reused.
//!
//! | Section | Wire name | Prefix |
//! |---------|-----------|--------|
//! | Research thread | `research_thread` | `RT` |
//! | Hypothesis slate | `hypothesis_slate` | `H` |
//! | Predictions table | `predictions_table` | `P` |
//! | Discriminative tests | `discriminative_tests` | `T` |
//! | Assumption ledger | `assumption_ledger` | `A` |
//! | Anomaly register | `anomaly_register` | `X` |
//! | Adversarial critique | `adversarial_critique` | `C` |

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the seven fixed artifact sections.
///
/// Declaration order is the canonical render order, and `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    ResearchThread,
    HypothesisSlate,
    PredictionsTable,
    DiscriminativeTests,
    AssumptionLedger,
    AnomalyRegister,
    AdversarialCritique,
}

impl Section {
    /// All sections in canonical order.
    pub const ALL: [Section; 7] = [
        Section::ResearchThread,
        Section::HypothesisSlate,
        Section::PredictionsTable,
        Section::DiscriminativeTests,
        Section::AssumptionLedger,
        Section::AnomalyRegister,
        Section::AdversarialCritique,
    ];

    /// Id prefix used for items of this section.
    pub fn prefix(&self) -> &'static str {
        match self {
            Section::ResearchThread => "RT",
            Section::HypothesisSlate => "H",
            Section::PredictionsTable => "P",
            Section::DiscriminativeTests => "T",
            Section::AssumptionLedger => "A",
            Section::AnomalyRegister => "X",
            Section::AdversarialCritique => "C",
        }
    }

    /// Wire name as it appears in delta blocks and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::ResearchThread => "research_thread",
            Section::HypothesisSlate => "hypothesis_slate",
            Section::PredictionsTable => "predictions_table",
            Section::DiscriminativeTests => "discriminative_tests",
            Section::AssumptionLedger => "assumption_ledger",
            Section::AnomalyRegister => "anomaly_register",
            Section::AdversarialCritique => "adversarial_critique",
        }
    }

    /// Human-readable heading used by the renderer.
    pub fn title(&self) -> &'static str {
        match self {
            Section::ResearchThread => "Research Thread",
            Section::HypothesisSlate => "Hypothesis Slate",
            Section::PredictionsTable => "Predictions Table",
            Section::DiscriminativeTests => "Discriminative Tests",
            Section::AssumptionLedger => "Assumption Ledger",
            Section::AnomalyRegister => "Anomaly Register",
            Section::AdversarialCritique => "Adversarial Critique",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.prefix() == prefix)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section '{0}'")]
pub struct UnknownSection(pub String);

// ============================================================================
// Item identity
// ============================================================================

/// Section-scoped item identifier (`H3`, `RT1`, ...).
///
/// Ordering is by section, then by number, so `H2 < H10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    section: Section,
    number: u32,
}

impl ItemId {
    /// Build an id. Numbers start at 1; zero is rejected.
    pub fn new(section: Section, number: u32) -> Result<Self, ItemIdError> {
        if number == 0 {
            return Err(ItemIdError::ZeroNumber(format!("{}0", section.prefix())));
        }
        Ok(Self { section, number })
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.section.prefix(), self.number)
    }
}

impl FromStr for ItemId {
    type Err = ItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ItemIdError::Malformed(s.to_string()))?;
        let (prefix, digits) = trimmed.split_at(split);

        let section = Section::from_prefix(&prefix.to_ascii_uppercase())
            .ok_or_else(|| ItemIdError::UnknownPrefix(s.to_string()))?;

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ItemIdError::Malformed(s.to_string()));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| ItemIdError::Malformed(s.to_string()))?;

        ItemId::new(section, number)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemIdError {
    #[error("malformed item id '{0}'")]
    Malformed(String),

    #[error("item id '{0}' has an unknown section prefix")]
    UnknownPrefix(String),

    #[error("item id '{0}' must be numbered from 1")]
    ZeroNumber(String),
}
