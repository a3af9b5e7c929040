// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lint Checker
//!
//! Read-only rule battery over a merged [`Artifact`]. Lint never blocks a
//! merge; it decides whether the result is fit to publish. An artifact is
//! `valid` iff no `error`-severity issue is reported.

use serde::Serialize;
use std::fmt;

use crate::domain::artifact::{Artifact, Item};
use crate::domain::config::{LintPolicy, MergePolicy};
use crate::domain::fields::SectionFields;
use crate::domain::section::{ItemId, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Lint rules, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LintCode {
    SectionBelowMinimum,
    SectionAboveMaximum,
    MissingThirdAlternative,
    MissingScaleCheck,
    DanglingPredictionReference,
    PredictionReferencesKilled,
    TestReferencesUnknownHypothesis,
    TestMissingPotencyCheck,
}

impl LintCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LintCode::SectionBelowMinimum => "SECTION_BELOW_MINIMUM",
            LintCode::SectionAboveMaximum => "SECTION_ABOVE_MAXIMUM",
            LintCode::MissingThirdAlternative => "MISSING_THIRD_ALTERNATIVE",
            LintCode::MissingScaleCheck => "MISSING_SCALE_CHECK",
            LintCode::DanglingPredictionReference => "DANGLING_PREDICTION_REFERENCE",
            LintCode::PredictionReferencesKilled => "PREDICTION_REFERENCES_KILLED",
            LintCode::TestReferencesUnknownHypothesis => "TEST_REFERENCES_UNKNOWN_HYPOTHESIS",
            LintCode::TestMissingPotencyCheck => "TEST_MISSING_POTENCY_CHECK",
        }
    }
}

impl fmt::Display for LintCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub severity: Severity,
    pub code: LintCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.code)?;
        match (self.section, self.item) {
            (_, Some(item)) => write!(f, " {}", item)?,
            (Some(section), None) => write!(f, " {}", section)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub valid: bool,
    pub issues: Vec<LintIssue>,
}

impl LintReport {
    pub fn errors(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn has_code(&self, code: LintCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

/// Lint with the default minimums and section limits.
pub fn lint(artifact: &Artifact) -> LintReport {
    lint_with(artifact, &LintPolicy::default(), &MergePolicy::default())
}

/// Lint against explicit minimums (`policy`) and maximums (`limits`).
pub fn lint_with(artifact: &Artifact, policy: &LintPolicy, limits: &MergePolicy) -> LintReport {
    let mut issues = Vec::new();

    check_cardinality(artifact, policy, limits, &mut issues);
    check_third_alternative(artifact, &mut issues);
    check_scale_check(artifact, &mut issues);
    check_predictions(artifact, &mut issues);
    check_tests(artifact, &mut issues);

    issues.sort_by(|a, b| (a.code, a.section, a.item).cmp(&(b.code, b.section, b.item)));
    let valid = !issues.iter().any(|i| i.severity == Severity::Error);

    tracing::debug!(
        thread = %artifact.thread_id,
        valid,
        issues = issues.len(),
        "Linted artifact"
    );
    LintReport { valid, issues }
}

/// Sections whose shortfall blocks publication outright.
fn below_minimum_severity(section: Section) -> Severity {
    match section {
        Section::ResearchThread | Section::AdversarialCritique => Severity::Error,
        _ => Severity::Warning,
    }
}

fn check_cardinality(artifact: &Artifact, policy: &LintPolicy, limits: &MergePolicy, issues: &mut Vec<LintIssue>) {
    for section in Section::ALL {
        let live = artifact.live_count(section);
        let minimum = policy.minimum(section);
        if live < minimum {
            issues.push(LintIssue {
                severity: below_minimum_severity(section),
                code: LintCode::SectionBelowMinimum,
                message: format!("{} has {} live item(s), needs at least {}", section.title(), live, minimum),
                section: Some(section),
                item: None,
            });
        }

        if let Some(limit) = limits.limit(section) {
            if live > limit {
                issues.push(LintIssue {
                    severity: Severity::Error,
                    code: LintCode::SectionAboveMaximum,
                    message: format!("{} has {} live item(s), limit is {}", section.title(), live, limit),
                    section: Some(section),
                    item: None,
                });
            }
        }
    }
}

fn check_third_alternative(artifact: &Artifact, issues: &mut Vec<LintIssue>) {
    let present = live(artifact, Section::HypothesisSlate).any(|item| {
        matches!(&item.fields, SectionFields::HypothesisSlate(f) if f.third_alternative == Some(true))
    });
    if !present {
        issues.push(LintIssue {
            severity: Severity::Error,
            code: LintCode::MissingThirdAlternative,
            message: "no live hypothesis is tagged third_alternative".to_string(),
            section: Some(Section::HypothesisSlate),
            item: None,
        });
    }
}

fn check_scale_check(artifact: &Artifact, issues: &mut Vec<LintIssue>) {
    let present = live(artifact, Section::AssumptionLedger).any(|item| {
        matches!(&item.fields, SectionFields::AssumptionLedger(f) if f.scale_check == Some(true))
    });
    if !present {
        issues.push(LintIssue {
            severity: Severity::Error,
            code: LintCode::MissingScaleCheck,
            message: "no live assumption is marked scale_check".to_string(),
            section: Some(Section::AssumptionLedger),
            item: None,
        });
    }
}

/// Resolve a hypothesis reference; `None` when the id is malformed, from
/// another section, or was never assigned.
fn hypothesis<'a>(artifact: &'a Artifact, reference: &str) -> Option<&'a Item> {
    let id: ItemId = reference.trim().parse().ok()?;
    if id.section() != Section::HypothesisSlate {
        return None;
    }
    artifact.item(&id)
}

fn is_not_applicable(outcome: &str) -> bool {
    outcome.trim().eq_ignore_ascii_case("n/a")
}

fn check_predictions(artifact: &Artifact, issues: &mut Vec<LintIssue>) {
    for item in live(artifact, Section::PredictionsTable) {
        let SectionFields::PredictionsTable(fields) = &item.fields else { continue };

        for (reference, outcome) in &fields.outcomes {
            match hypothesis(artifact, reference) {
                None => issues.push(LintIssue {
                    severity: Severity::Error,
                    code: LintCode::DanglingPredictionReference,
                    message: format!("references unknown hypothesis '{}'", reference),
                    section: Some(Section::PredictionsTable),
                    item: Some(item.id),
                }),
                Some(h) if !h.is_alive() && !is_not_applicable(outcome) => issues.push(LintIssue {
                    severity: Severity::Warning,
                    code: LintCode::PredictionReferencesKilled,
                    message: format!("outcome for killed hypothesis {} should be N/A", h.id),
                    section: Some(Section::PredictionsTable),
                    item: Some(item.id),
                }),
                Some(_) => {}
            }
        }
    }
}

fn check_tests(artifact: &Artifact, issues: &mut Vec<LintIssue>) {
    for item in live(artifact, Section::DiscriminativeTests) {
        let SectionFields::DiscriminativeTests(fields) = &item.fields else { continue };

        let mut references: Vec<&String> = fields.discriminates.iter().chain(fields.expected_outcomes.keys()).collect();
        references.sort();
        references.dedup();
        for reference in references {
            if hypothesis(artifact, reference).is_none() {
                issues.push(LintIssue {
                    severity: Severity::Warning,
                    code: LintCode::TestReferencesUnknownHypothesis,
                    message: format!("references unknown hypothesis '{}'", reference),
                    section: Some(Section::DiscriminativeTests),
                    item: Some(item.id),
                });
            }
        }

        let has_potency = fields.potency_check.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        if !has_potency {
            issues.push(LintIssue {
                severity: Severity::Warning,
                code: LintCode::TestMissingPotencyCheck,
                message: "no potency check recorded".to_string(),
                section: Some(Section::DiscriminativeTests),
                item: Some(item.id),
            });
        }
    }
}

fn live(artifact: &Artifact, section: Section) -> impl Iterator<Item = &Item> {
    artifact.items(section).iter().filter(|item| item.is_alive())
}
