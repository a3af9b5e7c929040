// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod compile;
pub mod lint;
pub mod merge;

pub use compile::{compile, count_published, CompileOutcome, CompileService, MergeOutcome};
pub use lint::{lint, lint_with, LintCode, LintIssue, LintReport, Severity};
pub use merge::{merge, MergeError, MergeFailure, MergeReport, MergeWarning, RejectionCode};
