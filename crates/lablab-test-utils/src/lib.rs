// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lablab plugin host tests.
//!
//! Provides on-disk plugin fixtures and mock plugins for fast,
//! deterministic tests of discovery, loading and contract probing.
//!
//! # Components
//!
//! - [`PluginFixture`] - Temporary plugin search path with a directory builder
//! - [`MockPluginFactory`] - Factories for mock plugins with scripted behavior

pub mod fixture;
pub mod mock_plugin;

pub use fixture::{PluginDirBuilder, PluginFixture};
pub use mock_plugin::{mock_factories, MockBehavior, MockDiagnostics, MockPluginFactory};
