// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Replay properties of the merge engine.
//!
//! - Determinism: same history, byte-identical render
//! - KILL idempotence
//! - Id monotonicity across kills
//! - EDIT-of-killed rejection
//! - Tie-break by arrival order vs. reordering by timestamp
//! - Cardinality enforcement, and replacement of killed items

use chrono::{DateTime, Duration, TimeZone, Utc};
use tessera_core::application::lint::{lint, LintCode};
use tessera_core::application::merge::{merge, MergeReport, RejectionCode};
use tessera_core::domain::config::MergePolicy;
use tessera_core::presentation::renderer::render;
use tessera_core::{Artifact, AssumptionFields, Delta, HypothesisFields, ItemId, Section, SectionFields};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn hypothesis(claim: &str) -> SectionFields {
    SectionFields::HypothesisSlate(HypothesisFields {
        claim: Some(claim.to_string()),
        ..Default::default()
    })
}

fn assumption(statement: &str) -> SectionFields {
    SectionFields::AssumptionLedger(AssumptionFields {
        statement: Some(statement.to_string()),
        ..Default::default()
    })
}

fn h(n: u32) -> ItemId {
    ItemId::new(Section::HypothesisSlate, n).unwrap()
}

fn a(n: u32) -> ItemId {
    ItemId::new(Section::AssumptionLedger, n).unwrap()
}

fn run(deltas: &[Delta]) -> MergeReport {
    merge(&Artifact::empty("RS-1"), deltas, &MergePolicy::default()).unwrap()
}

fn claims(report: &MergeReport) -> Vec<(String, String)> {
    report
        .artifact
        .items(Section::HypothesisSlate)
        .iter()
        .filter_map(|item| match &item.fields {
            SectionFields::HypothesisSlate(f) => Some((item.id.to_string(), f.claim.clone().unwrap_or_default())),
            _ => None,
        })
        .collect()
}

fn history() -> Vec<Delta> {
    vec![
        Delta::add("BlueLake", t(1), hypothesis("X")),
        Delta::add("GreenCastle", t(2), hypothesis("Y")),
        Delta::edit("RedFox", t(3), h(1), hypothesis("X'")).with_rationale("sharper"),
        Delta::kill("RedFox", t(4), h(2), Some("contradicted by §12".into())),
        Delta::add("BlueLake", t(5), assumption("closed system")),
    ]
}

#[test]
fn test_replay_is_deterministic() {
    let deltas = history();
    let first = run(&deltas);
    let second = run(&deltas);

    assert_eq!(first, second);
    assert_eq!(render(&first.artifact), render(&second.artifact));
}

#[test]
fn test_kill_is_idempotent() {
    let base = history();
    let tail = Delta::add("BlueLake", t(7), assumption("bounded"));

    let mut once = base.clone();
    once.push(tail.clone());
    let mut twice = base;
    twice.push(Delta::kill("RedFox", t(6), h(2), Some("again".into())));
    twice.push(tail);

    let once = run(&once);
    let twice = run(&twice);
    assert_eq!(once.artifact, twice.artifact);
    assert_eq!(twice.noops, 1);
    assert_eq!(twice.skipped, 0);
    assert!(twice.warnings.is_empty());
}

#[test]
fn test_ids_increase_after_kills() {
    let report = run(&[
        Delta::add("BlueLake", t(1), assumption("a")),
        Delta::add("BlueLake", t(2), assumption("b")),
        Delta::kill("RedFox", t(3), a(2), None),
        Delta::kill("RedFox", t(4), a(1), None),
        Delta::add("BlueLake", t(5), assumption("c")),
    ]);

    let ids: Vec<String> = report
        .artifact
        .items(Section::AssumptionLedger)
        .iter()
        .map(|i| i.id.to_string())
        .collect();
    assert_eq!(ids, vec!["A1", "A2", "A3"]);
    assert_eq!(report.artifact.section(Section::AssumptionLedger).unwrap().last_assigned, 3);
    assert!(report.artifact.item(&a(3)).unwrap().is_alive());
}

#[test]
fn test_edit_of_killed_item_is_rejected() {
    let report = run(&[
        Delta::add("BlueLake", t(1), hypothesis("X")),
        Delta::kill("RedFox", t(2), h(1), None),
        Delta::edit("GreenCastle", t(3), h(1), hypothesis("Z")),
    ]);

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code, RejectionCode::TargetKilled);
    assert_eq!(claims(&report), vec![("H1".to_string(), "X".to_string())]);
    assert!(!report.artifact.contributors.contains("GreenCastle"));
}

#[test]
fn test_equal_timestamps_keep_arrival_order() {
    let first = Delta::add("BlueLake", t(1), hypothesis("first"));
    let second = Delta::add("GreenCastle", t(1), hypothesis("second"));

    let forward = run(&[first.clone(), second.clone()]);
    let swapped = run(&[second.clone(), first.clone()]);
    assert_eq!(
        claims(&forward),
        vec![("H1".to_string(), "first".to_string()), ("H2".to_string(), "second".to_string())]
    );
    assert_eq!(
        claims(&swapped),
        vec![("H1".to_string(), "second".to_string()), ("H2".to_string(), "first".to_string())]
    );
}

#[test]
fn test_timestamps_decide_order_over_input_position() {
    let early = Delta::add("BlueLake", t(1), hypothesis("early"));
    let late = Delta::add("GreenCastle", t(2), hypothesis("late"));

    let forward = run(&[early.clone(), late.clone()]);
    let reversed = run(&[late.clone(), early.clone()]);
    assert_eq!(forward.artifact, reversed.artifact);

    let mut retimed_early = early.clone();
    retimed_early.timestamp = t(3);
    let retimed = run(&[retimed_early, late]);
    assert_eq!(claims(&retimed)[0].1, "late");
}

#[test]
fn test_adds_beyond_limit_do_not_grow_section() {
    let deltas: Vec<Delta> = (0..9)
        .map(|i| Delta::add("BlueLake", t(i), hypothesis(&format!("h{}", i))))
        .collect();
    let report = run(&deltas);

    assert_eq!(report.artifact.items(Section::HypothesisSlate).len(), 6);
    assert_eq!(report.applied, 6);
    assert_eq!(report.skipped, 3);
    assert!(report
        .warnings
        .iter()
        .all(|w| w.code == RejectionCode::SectionLimitExceeded && w.section == Section::HypothesisSlate));

    let unbounded = merge(&Artifact::empty("RS-1"), &deltas, &MergePolicy::unbounded()).unwrap();
    assert_eq!(unbounded.artifact.items(Section::HypothesisSlate).len(), 9);
}

#[test]
fn test_research_thread_holds_one_statement() {
    let statement = |s: &str| {
        SectionFields::ResearchThread(tessera_core::ThreadFields {
            statement: Some(s.to_string()),
            ..Default::default()
        })
    };
    let report = run(&[
        Delta::add("BlueLake", t(1), statement("Why?")),
        Delta::add("GreenCastle", t(2), statement("Why not?")),
    ]);
    assert_eq!(report.artifact.items(Section::ResearchThread).len(), 1);
    assert_eq!(report.warnings[0].code, RejectionCode::SectionLimitExceeded);
}

#[test]
fn test_killed_research_thread_can_be_replaced() {
    let statement = |s: &str| {
        SectionFields::ResearchThread(tessera_core::ThreadFields {
            statement: Some(s.to_string()),
            ..Default::default()
        })
    };
    let rt = |n: u32| ItemId::new(Section::ResearchThread, n).unwrap();
    let report = run(&[
        Delta::add("BlueLake", t(1), statement("old question")),
        Delta::kill("RedFox", t(2), rt(1), Some("too broad".into())),
        Delta::add("GreenCastle", t(3), statement("new question")),
    ]);

    assert_eq!(report.applied, 3);
    assert_eq!(report.skipped, 0);
    assert!(report.warnings.is_empty());
    assert!(!report.artifact.item(&rt(1)).unwrap().is_alive());
    assert!(report.artifact.item(&rt(2)).unwrap().is_alive());
    assert_eq!(report.artifact.live_count(Section::ResearchThread), 1);

    let lint = lint(&report.artifact);
    assert!(!lint
        .issues
        .iter()
        .any(|i| i.section == Some(Section::ResearchThread)
            && matches!(i.code, LintCode::SectionBelowMinimum | LintCode::SectionAboveMaximum)));
}
