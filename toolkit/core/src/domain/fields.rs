// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Section Field Payloads
//!
//! Every section has a closed, typed field struct. All known fields are
//! optional so the same struct doubles as an EDIT patch; unknown payload keys
//! are captured in an `extra` map instead of being rejected, which keeps older
//! binaries able to merge deltas written against a newer payload shape.
//!
//! ## Patch semantics
//!
//! | Field kind | Default | Named in `replace_fields` |
//! |------------|---------|---------------------------|
//! | scalar (`Option<T>`) | overwrite when present | same |
//! | list (`Vec<String>`) | order-preserving union | overwrite (may clear) |
//! | map (`BTreeMap`) | key-wise overwrite | overwrite (may clear) |
//! | `extra` arrays / objects | union / key-wise | overwrite |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::domain::section::Section;

/// Field names an EDIT asked to overwrite rather than merge.
pub type ReplaceFields = BTreeSet<String>;

/// Open extension map for payload keys the schema does not know yet.
pub type ExtraFields = BTreeMap<String, Value>;

// ============================================================================
// Per-section field structs
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    /// Tags the "both leading hypotheses could be wrong" entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_alternative: Option<bool>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Predicted outcome per hypothesis id (`"H1" -> "rises"`, `"H2" -> "N/A"`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Coarse scoring of a discriminative test, each axis on a small integer scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likelihood_ratio: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    /// Hypothesis ids this test separates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discriminates: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expected_outcomes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potency_check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<TestScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumptionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    /// What breaks if the assumption is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Marks an order-of-magnitude / physics sanity check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CritiqueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

// ============================================================================
// Closed sum over sections
// ============================================================================

/// Typed payload of an item, one variant per [`Section`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionFields {
    ResearchThread(ThreadFields),
    HypothesisSlate(HypothesisFields),
    PredictionsTable(PredictionFields),
    DiscriminativeTests(TestFields),
    AssumptionLedger(AssumptionFields),
    AnomalyRegister(AnomalyFields),
    AdversarialCritique(CritiqueFields),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {patch} fields to a {target} item")]
pub struct FieldsMismatch {
    pub target: Section,
    pub patch: Section,
}

impl SectionFields {
    /// Deserialize a raw payload object into the typed fields of `section`.
    pub fn from_payload(section: Section, payload: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(payload);
        Ok(match section {
            Section::ResearchThread => SectionFields::ResearchThread(serde_json::from_value(value)?),
            Section::HypothesisSlate => SectionFields::HypothesisSlate(serde_json::from_value(value)?),
            Section::PredictionsTable => SectionFields::PredictionsTable(serde_json::from_value(value)?),
            Section::DiscriminativeTests => SectionFields::DiscriminativeTests(serde_json::from_value(value)?),
            Section::AssumptionLedger => SectionFields::AssumptionLedger(serde_json::from_value(value)?),
            Section::AnomalyRegister => SectionFields::AnomalyRegister(serde_json::from_value(value)?),
            Section::AdversarialCritique => SectionFields::AdversarialCritique(serde_json::from_value(value)?),
        })
    }

    /// Empty field set for `section` (used for KILL deltas and tests).
    pub fn empty(section: Section) -> Self {
        match section {
            Section::ResearchThread => SectionFields::ResearchThread(ThreadFields::default()),
            Section::HypothesisSlate => SectionFields::HypothesisSlate(HypothesisFields::default()),
            Section::PredictionsTable => SectionFields::PredictionsTable(PredictionFields::default()),
            Section::DiscriminativeTests => SectionFields::DiscriminativeTests(TestFields::default()),
            Section::AssumptionLedger => SectionFields::AssumptionLedger(AssumptionFields::default()),
            Section::AnomalyRegister => SectionFields::AnomalyRegister(AnomalyFields::default()),
            Section::AdversarialCritique => SectionFields::AdversarialCritique(CritiqueFields::default()),
        }
    }

    pub fn section(&self) -> Section {
        match self {
            SectionFields::ResearchThread(_) => Section::ResearchThread,
            SectionFields::HypothesisSlate(_) => Section::HypothesisSlate,
            SectionFields::PredictionsTable(_) => Section::PredictionsTable,
            SectionFields::DiscriminativeTests(_) => Section::DiscriminativeTests,
            SectionFields::AssumptionLedger(_) => Section::AssumptionLedger,
            SectionFields::AnomalyRegister(_) => Section::AnomalyRegister,
            SectionFields::AdversarialCritique(_) => Section::AdversarialCritique,
        }
    }

    /// Name of the field an ADD must carry for this section, if it is absent.
    ///
    /// Only sections whose entries are defined by a single statement require
    /// one; the other sections accept partial entries that later EDITs fill in.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        match self {
            SectionFields::ResearchThread(f) => (!present(&f.statement)).then_some("statement"),
            SectionFields::HypothesisSlate(f) => (!present(&f.claim)).then_some("claim"),
            SectionFields::PredictionsTable(f) => (!present(&f.condition)).then_some("condition"),
            _ => None,
        }
    }

    /// Apply an EDIT patch onto these fields in place.
    pub fn apply_patch(&mut self, patch: SectionFields, replace: &ReplaceFields) -> Result<(), FieldsMismatch> {
        match (self, patch) {
            (SectionFields::ResearchThread(f), SectionFields::ResearchThread(p)) => {
                overwrite(&mut f.statement, p.statement);
                overwrite(&mut f.context, p.context);
                overwrite(&mut f.why_it_matters, p.why_it_matters);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::HypothesisSlate(f), SectionFields::HypothesisSlate(p)) => {
                overwrite(&mut f.name, p.name);
                overwrite(&mut f.claim, p.claim);
                overwrite(&mut f.mechanism, p.mechanism);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                overwrite(&mut f.third_alternative, p.third_alternative);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::PredictionsTable(f), SectionFields::PredictionsTable(p)) => {
                overwrite(&mut f.condition, p.condition);
                merge_map(&mut f.outcomes, p.outcomes, "outcomes", replace);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::DiscriminativeTests(f), SectionFields::DiscriminativeTests(p)) => {
                overwrite(&mut f.name, p.name);
                overwrite(&mut f.procedure, p.procedure);
                merge_list(&mut f.discriminates, p.discriminates, "discriminates", replace);
                merge_map(&mut f.expected_outcomes, p.expected_outcomes, "expected_outcomes", replace);
                overwrite(&mut f.potency_check, p.potency_check);
                merge_score(&mut f.score, p.score, replace);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::AssumptionLedger(f), SectionFields::AssumptionLedger(p)) => {
                overwrite(&mut f.name, p.name);
                overwrite(&mut f.statement, p.statement);
                overwrite(&mut f.load, p.load);
                overwrite(&mut f.test, p.test);
                overwrite(&mut f.scale_check, p.scale_check);
                overwrite(&mut f.calculation, p.calculation);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::AnomalyRegister(f), SectionFields::AnomalyRegister(p)) => {
                overwrite(&mut f.name, p.name);
                overwrite(&mut f.observation, p.observation);
                merge_list(&mut f.conflicts_with, p.conflicts_with, "conflicts_with", replace);
                overwrite(&mut f.quarantine_status, p.quarantine_status);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (SectionFields::AdversarialCritique(f), SectionFields::AdversarialCritique(p)) => {
                overwrite(&mut f.name, p.name);
                overwrite(&mut f.attack, p.attack);
                overwrite(&mut f.evidence, p.evidence);
                overwrite(&mut f.current_status, p.current_status);
                merge_list(&mut f.anchors, p.anchors, "anchors", replace);
                merge_extra(&mut f.extra, p.extra, replace);
            }
            (target, patch) => {
                return Err(FieldsMismatch {
                    target: target.section(),
                    patch: patch.section(),
                })
            }
        }
        Ok(())
    }

    /// Citation anchors, present on every section.
    pub fn anchors(&self) -> &[String] {
        match self {
            SectionFields::ResearchThread(f) => &f.anchors,
            SectionFields::HypothesisSlate(f) => &f.anchors,
            SectionFields::PredictionsTable(f) => &f.anchors,
            SectionFields::DiscriminativeTests(f) => &f.anchors,
            SectionFields::AssumptionLedger(f) => &f.anchors,
            SectionFields::AnomalyRegister(f) => &f.anchors,
            SectionFields::AdversarialCritique(f) => &f.anchors,
        }
    }

    pub fn extra(&self) -> &ExtraFields {
        match self {
            SectionFields::ResearchThread(f) => &f.extra,
            SectionFields::HypothesisSlate(f) => &f.extra,
            SectionFields::PredictionsTable(f) => &f.extra,
            SectionFields::DiscriminativeTests(f) => &f.extra,
            SectionFields::AssumptionLedger(f) => &f.extra,
            SectionFields::AnomalyRegister(f) => &f.extra,
            SectionFields::AdversarialCritique(f) => &f.extra,
        }
    }
}

// ============================================================================
// Merge helpers
// ============================================================================

fn overwrite<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

fn merge_list(slot: &mut Vec<String>, incoming: Vec<String>, field: &str, replace: &ReplaceFields) {
    if replace.contains(field) {
        *slot = dedup(incoming);
        return;
    }
    for value in incoming {
        if !slot.contains(&value) {
            slot.push(value);
        }
    }
}

fn merge_map(
    slot: &mut BTreeMap<String, String>,
    incoming: BTreeMap<String, String>,
    field: &str,
    replace: &ReplaceFields,
) {
    if replace.contains(field) {
        *slot = incoming;
    } else {
        slot.extend(incoming);
    }
}

fn merge_score(slot: &mut Option<TestScore>, incoming: Option<TestScore>, replace: &ReplaceFields) {
    if replace.contains("score") {
        *slot = incoming;
        return;
    }
    let Some(incoming) = incoming else { return };
    let score = slot.get_or_insert_with(TestScore::default);
    overwrite(&mut score.likelihood_ratio, incoming.likelihood_ratio);
    overwrite(&mut score.cost, incoming.cost);
    overwrite(&mut score.speed, incoming.speed);
    overwrite(&mut score.ambiguity, incoming.ambiguity);
}

fn merge_extra(slot: &mut ExtraFields, incoming: ExtraFields, replace: &ReplaceFields) {
    for (key, value) in incoming {
        if replace.contains(&key) {
            slot.insert(key, value);
            continue;
        }
        match (slot.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(new)) => {
                for v in new {
                    if !existing.contains(&v) {
                        existing.push(v);
                    }
                }
            }
            (Some(Value::Object(existing)), Value::Object(new)) => {
                existing.extend(new);
            }
            (_, value) => {
                slot.insert(key, value);
            }
        }
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn replace(fields: &[&str]) -> ReplaceFields {
        fields.iter().map(|f| f.to_string()).collect()
    }

    // ── Payload parsing ───────────────────────────────────────────────────────

    #[test]
    fn test_from_payload_captures_unknown_keys() {
        let fields = SectionFields::from_payload(
            Section::HypothesisSlate,
            payload(json!({"claim": "X", "confidence": 0.4, "anchors": ["§1"]})),
        )
        .unwrap();

        let SectionFields::HypothesisSlate(h) = fields else { panic!("wrong variant") };
        assert_eq!(h.claim.as_deref(), Some("X"));
        assert_eq!(h.anchors, vec!["§1"]);
        assert_eq!(h.extra.get("confidence"), Some(&json!(0.4)));
    }

    #[test]
    fn test_from_payload_rejects_type_mismatch() {
        let err = SectionFields::from_payload(
            Section::DiscriminativeTests,
            payload(json!({"name": "T", "anchors": 12})),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let fields = SectionFields::from_payload(Section::HypothesisSlate, payload(json!({"name": "n"}))).unwrap();
        assert_eq!(fields.missing_required_field(), Some("claim"));

        let blank = SectionFields::from_payload(Section::ResearchThread, payload(json!({"statement": "  "}))).unwrap();
        assert_eq!(blank.missing_required_field(), Some("statement"));

        let partial = SectionFields::from_payload(Section::DiscriminativeTests, payload(json!({"anchors": ["§99"]}))).unwrap();
        assert_eq!(partial.missing_required_field(), None);
    }

    // ── Patching ──────────────────────────────────────────────────────────────

    #[test]
    fn test_patch_unions_lists_by_default() {
        let mut fields = SectionFields::from_payload(
            Section::DiscriminativeTests,
            payload(json!({"name": "t", "anchors": ["§99"]})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(
            Section::DiscriminativeTests,
            payload(json!({"anchors": ["§103", "§99"]})),
        )
        .unwrap();

        fields.apply_patch(patch, &ReplaceFields::new()).unwrap();
        assert_eq!(fields.anchors(), ["§99".to_string(), "§103".to_string()]);
    }

    #[test]
    fn test_patch_replaces_marked_lists() {
        let mut fields = SectionFields::from_payload(
            Section::HypothesisSlate,
            payload(json!({"claim": "c", "anchors": ["§1", "§2"]})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(Section::HypothesisSlate, payload(json!({"anchors": ["§3"]}))).unwrap();

        fields.apply_patch(patch, &replace(&["anchors"])).unwrap();
        assert_eq!(fields.anchors(), ["§3".to_string()]);
    }

    #[test]
    fn test_patch_overwrites_scalars_and_leaves_absent_fields() {
        let mut fields = SectionFields::from_payload(
            Section::HypothesisSlate,
            payload(json!({"claim": "old", "mechanism": "m"})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(Section::HypothesisSlate, payload(json!({"claim": "new"}))).unwrap();

        fields.apply_patch(patch, &ReplaceFields::new()).unwrap();
        let SectionFields::HypothesisSlate(h) = fields else { panic!("wrong variant") };
        assert_eq!(h.claim.as_deref(), Some("new"));
        assert_eq!(h.mechanism.as_deref(), Some("m"));
    }

    #[test]
    fn test_patch_merges_outcome_maps_key_wise() {
        let mut fields = SectionFields::from_payload(
            Section::PredictionsTable,
            payload(json!({"condition": "c", "outcomes": {"H1": "up", "H2": "down"}})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(
            Section::PredictionsTable,
            payload(json!({"outcomes": {"H2": "N/A", "H3": "flat"}})),
        )
        .unwrap();

        fields.apply_patch(patch, &ReplaceFields::new()).unwrap();
        let SectionFields::PredictionsTable(p) = fields else { panic!("wrong variant") };
        assert_eq!(p.outcomes.len(), 3);
        assert_eq!(p.outcomes["H2"], "N/A");
    }

    #[test]
    fn test_patch_merges_score_axes() {
        let mut fields = SectionFields::from_payload(
            Section::DiscriminativeTests,
            payload(json!({"name": "t", "score": {"likelihood_ratio": 3, "cost": 1}})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(
            Section::DiscriminativeTests,
            payload(json!({"score": {"cost": 2}})),
        )
        .unwrap();

        fields.apply_patch(patch, &ReplaceFields::new()).unwrap();
        let SectionFields::DiscriminativeTests(t) = fields else { panic!("wrong variant") };
        let score = t.score.unwrap();
        assert_eq!(score.likelihood_ratio, Some(3));
        assert_eq!(score.cost, Some(2));
    }

    #[test]
    fn test_patch_unions_extra_arrays() {
        let mut fields = SectionFields::from_payload(
            Section::AnomalyRegister,
            payload(json!({"observation": "o", "tags": ["a"]})),
        )
        .unwrap();
        let patch = SectionFields::from_payload(Section::AnomalyRegister, payload(json!({"tags": ["b", "a"]}))).unwrap();

        fields.apply_patch(patch, &ReplaceFields::new()).unwrap();
        assert_eq!(fields.extra().get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_patch_section_mismatch() {
        let mut fields = SectionFields::empty(Section::HypothesisSlate);
        let err = fields
            .apply_patch(SectionFields::empty(Section::AssumptionLedger), &ReplaceFields::new())
            .unwrap_err();
        assert_eq!(err.target, Section::HypothesisSlate);
        assert_eq!(err.patch, Section::AssumptionLedger);
    }
}
