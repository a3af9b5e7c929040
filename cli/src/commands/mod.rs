// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Tessera CLI

pub mod artifact;
pub mod config;
pub mod delta;

pub use self::artifact::ArtifactCommand;
pub use self::config::ConfigCommand;
pub use self::delta::DeltaCommand;
