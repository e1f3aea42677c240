// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugins compiled into the host.

pub mod process_diagnostics;

pub use process_diagnostics::{
    ProcessDiagnostics, ProcessDiagnosticsFactory, ProcessDiagnosticsPlugin,
    PROCESS_DIAGNOSTICS_ENTRY_TYPE,
};
