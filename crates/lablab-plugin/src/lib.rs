// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery, loading and verification for the Lablab plugin host.
//!
//! Provides manifest parsing, module resolution through a catalog of
//! compiled-in factories, a contract-indexed capability registry, the admin
//! status view, contract probes and the health snapshot export.

pub mod admin;
pub mod builtin;
pub mod catalog;
pub mod error;
pub mod filter;
pub mod loader;
pub mod manifest;
pub mod memory;
pub mod metrics;
pub mod module;
pub mod probe;
pub mod registry;
pub mod snapshot;

pub use admin::{PluginAdminService, PluginStatusEntry, SystemStatus};
pub use catalog::{builtin_catalog, PluginCatalog};
pub use error::{ExportError, LoadError, ManifestError, ModuleError, ProbeError};
pub use filter::PluginFilter;
pub use loader::{DiscoveryRun, PluginCandidate, PluginLoader, PluginRecord, PluginState};
pub use manifest::{parse_manifest, parse_manifest_file, PluginManifest};
pub use metrics::{MetricsSnapshot, PluginSystemMetrics};
pub use module::{CatalogModuleLoader, ModuleLoader};
pub use probe::{ProbeReport, ProbeResult, ProbeRunner, ProbeSequence, ProbeSuite, ProbedContract};
pub use registry::{CapabilityRegistry, CapabilityRegistryBuilder};
pub use snapshot::{HealthSnapshot, SnapshotState};
