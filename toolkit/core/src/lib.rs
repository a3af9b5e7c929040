// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tessera Core
//!
//! Delta parsing, artifact merge, lint and rendering for multi-agent research
//! threads.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Fold a thread's message history into a versioned research
//!   artifact, deterministically
//!
//! | Layer | Contents |
//! |-------|----------|
//! | [`domain`] | sections, ids, field payloads, deltas, artifact, messages, config |
//! | [`application`] | merge engine, lint checker, compile pipeline |
//! | [`infrastructure`] | delta parser, file and HTTP message sources |
//! | [`presentation`] | markdown renderer |

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
