// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tessera Domain Layer
//!
//! Pure domain types for the research artifact. No I/O dependencies beyond
//! the config loader.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`section`] | `Section`, `ItemId` |
//! | [`fields`] | `SectionFields` and the per-section field structs |
//! | [`delta`] | `Delta`, `DeltaOp`, `DeltaId` |
//! | [`artifact`] | `Artifact`, `Item`, `ItemStatus` |
//! | [`message`] | `ThreadMessage`, `MessageSource`, `MessagePublisher` |
//! | [`config`] | `ToolkitConfigManifest`, `MergePolicy`, `LintPolicy` |

pub mod artifact;
pub mod config;
pub mod delta;
pub mod fields;
pub mod message;
pub mod section;

pub use artifact::*;
pub use delta::*;
pub use fields::*;
pub use message::*;
pub use section::*;
