// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the Lablab plugin architecture.
//!
//! [`Plugin`] is the lifecycle every loadable module implements. Feature
//! contracts such as [`DiagnosticProvider`] are ordinary object-safe traits
//! marked with [`Contract`] so the host can index instances by contract.

pub mod contract;
pub mod diagnostic;
pub mod plugin;

pub use contract::{CapabilityRegistration, CapabilitySet, Contract};
pub use diagnostic::DiagnosticProvider;
pub use plugin::{Plugin, PluginContext, PluginFactory};
