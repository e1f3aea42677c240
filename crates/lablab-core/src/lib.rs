// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lablab plugin host.
//!
//! This crate provides the plugin lifecycle trait, the contract marker used to
//! index capabilities, the diagnostics contract, shared health types and the
//! error type. Plugin implementations depend only on this crate.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LablabError;
pub use types::{
    HealthHandle, HealthReport, HealthStatus, PluginHealth, MANIFEST_FILE_NAME, MODULE_EXTENSION,
    MODULE_MAGIC,
};

pub use traits::{
    CapabilityRegistration, CapabilitySet, Contract, DiagnosticProvider, Plugin, PluginContext,
    PluginFactory,
};
