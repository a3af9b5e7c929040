// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end scenarios: message bodies in, merged artifact / lint report out.
//!
//! Each test drives the real delta parser so the block format, the merge
//! engine and the lint checker are exercised together.

use chrono::{Duration, TimeZone, Utc};
use tessera_core::application::lint::{lint, LintCode, Severity};
use tessera_core::application::merge::{merge, MergeReport, RejectionCode};
use tessera_core::domain::config::MergePolicy;
use tessera_core::infrastructure::delta_parser::{DeltaParser, ParsedBlock};
use tessera_core::{Artifact, ItemId, Section, SectionFields, ThreadMessage};

fn message(id: i64, sender: &str, body: &str) -> ThreadMessage {
    ThreadMessage {
        id,
        sender: sender.to_string(),
        created_ts: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(id),
        subject: None,
        thread_id: Some("RS-20260301-heat".to_string()),
        body: body.to_string(),
    }
}

fn block(json: &str) -> String {
    format!("Proposed change:\n\n```delta\n{}\n```\n", json)
}

fn compile(messages: &[ThreadMessage]) -> MergeReport {
    let parsed = DeltaParser::parse_history(messages);
    assert!(parsed.rejected.is_empty(), "unexpected rejections: {:?}", parsed.rejected);
    merge(&Artifact::empty("RS-20260301-heat"), &parsed.deltas, &MergePolicy::default()).unwrap()
}

fn id(s: &str) -> ItemId {
    s.parse().unwrap()
}

#[test]
fn test_two_adds_get_sequential_ids_and_both_contributors() {
    let report = compile(&[
        message(1, "BlueLake", &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "X"}}"#)),
        message(2, "GreenCastle", &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "Y"}}"#)),
    ]);

    let items = report.artifact.items(Section::HypothesisSlate);
    assert_eq!(items.len(), 2);
    for (item, (expected_id, expected_claim)) in items.iter().zip([("H1", "X"), ("H2", "Y")]) {
        assert_eq!(item.id.to_string(), expected_id);
        match &item.fields {
            SectionFields::HypothesisSlate(f) => assert_eq!(f.claim.as_deref(), Some(expected_claim)),
            other => panic!("unexpected fields {:?}", other),
        }
    }
    assert!(report.artifact.contributors.contains("BlueLake"));
    assert!(report.artifact.contributors.contains("GreenCastle"));
}

#[test]
fn test_edit_after_kill_is_rejected() {
    let report = compile(&[
        message(1, "BlueLake", &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "X"}}"#)),
        message(
            2,
            "RedFox",
            &block(r#"{"operation": "KILL", "section": "hypothesis_slate", "target_id": "H1", "payload": {"reason": "bad"}}"#),
        ),
        message(
            3,
            "GreenCastle",
            &block(r#"{"operation": "EDIT", "section": "hypothesis_slate", "target_id": "H1", "payload": {"claim": "Z"}}"#),
        ),
    ]);

    let h1 = report.artifact.item(&id("H1")).unwrap();
    assert_eq!(h1.kill_record().unwrap().reason.as_deref(), Some("bad"));
    match &h1.fields {
        SectionFields::HypothesisSlate(f) => assert_eq!(f.claim.as_deref(), Some("X")),
        other => panic!("unexpected fields {:?}", other),
    }
    assert_eq!(report.skipped, 1);
    assert_eq!(report.warnings[0].code, RejectionCode::TargetKilled);
    assert_eq!(report.warnings[0].agent, "GreenCastle");
}

#[test]
fn test_anchor_edit_unions_by_default() {
    let report = compile(&[
        message(
            1,
            "BlueLake",
            &block(r#"{"operation": "ADD", "section": "discriminative_tests", "payload": {"anchors": ["§99"]}}"#),
        ),
        message(
            2,
            "GreenCastle",
            &block(r#"{"operation": "EDIT", "section": "discriminative_tests", "target_id": "T1", "payload": {"anchors": ["§103"]}}"#),
        ),
    ]);

    let t1 = report.artifact.item(&id("T1")).unwrap();
    assert_eq!(t1.fields.anchors(), ["§99".to_string(), "§103".to_string()]);
}

#[test]
fn test_anchor_edit_with_replace_fields_overwrites() {
    let report = compile(&[
        message(
            1,
            "BlueLake",
            &block(r#"{"operation": "ADD", "section": "discriminative_tests", "payload": {"anchors": ["§99"]}}"#),
        ),
        message(
            2,
            "GreenCastle",
            &block(
                r#"{"operation": "EDIT", "section": "discriminative_tests", "target_id": "T1", "payload": {"anchors": ["§103"], "replace_fields": ["anchors"]}}"#,
            ),
        ),
    ]);

    let t1 = report.artifact.item(&id("T1")).unwrap();
    assert_eq!(t1.fields.anchors(), ["§103".to_string()]);
}

#[test]
fn test_missing_third_alternative_fails_lint() {
    let report = compile(&[
        message(1, "BlueLake", &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "A"}}"#)),
        message(2, "BlueLake", &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "B"}}"#)),
        message(
            3,
            "BlueLake",
            &block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "C", "third_alternative": false}}"#),
        ),
    ]);

    let lint = lint(&report.artifact);
    assert!(!lint.valid);
    let issue = lint
        .issues
        .iter()
        .find(|i| i.code == LintCode::MissingThirdAlternative)
        .unwrap();
    assert_eq!(issue.severity, Severity::Error);
}

#[test]
fn test_parser_reports_one_valid_and_one_invalid_block() {
    let body = format!(
        "Two proposals.\n\n{}\n{}",
        block(r#"{"operation": "ADD", "section": "hypothesis_slate", "payload": {"claim": "X"}}"#),
        block(r#"{"operation": "ADD", "payload": {"claim": "Y"}}"#),
    );
    let blocks = DeltaParser::parse_message(&message(1, "BlueLake", &body));

    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], ParsedBlock::Valid(_)));
    match &blocks[1] {
        ParsedBlock::Invalid(invalid) => {
            assert_eq!(invalid.reason.to_string(), "MISSING_REQUIRED_FIELD: section");
        }
        other => panic!("expected invalid block, got {:?}", other),
    }
}
