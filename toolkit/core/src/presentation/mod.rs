// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod renderer;

pub use renderer::{find_marker, marker, render, ArtifactMarker};
