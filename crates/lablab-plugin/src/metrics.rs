// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin system counters and gauges.
//!
//! Values are kept in atomics so they can be read back without an exporter,
//! and mirrored to the `metrics` facade for whichever recorder is installed.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

pub const PLUGINS_DISCOVERED_TOTAL: &str = "lablab_plugins_discovered_total";
pub const PLUGINS_LOADED_TOTAL: &str = "lablab_plugins_loaded_total";
pub const PLUGINS_FAILED_TOTAL: &str = "lablab_plugins_failed_total";
pub const MANIFEST_ERRORS_TOTAL: &str = "lablab_plugin_manifest_errors_total";
pub const PLUGIN_LOAD_DURATION_SECONDS: &str = "lablab_plugin_load_duration_seconds";
pub const PLUGIN_MEMORY_BYTES: &str = "lablab_plugin_memory_bytes";
pub const PROCESS_RESIDENT_BYTES: &str = "lablab_process_resident_bytes";
pub const CONTRACT_PROBES_TOTAL: &str = "lablab_contract_probes_total";
pub const CONTRACT_PROBE_FAILURES_TOTAL: &str = "lablab_contract_probe_failures_total";
pub const UNATTRIBUTED_PROBES_TOTAL: &str = "lablab_unattributed_probes_total";

/// Plugin system counters. All counters are monotonic.
#[derive(Debug, Default)]
pub struct PluginSystemMetrics {
    discovered: AtomicU64,
    loaded: AtomicU64,
    failed: AtomicU64,
    manifest_errors: AtomicU64,
    load_time_micros: AtomicU64,
    plugin_memory_bytes: AtomicI64,
    process_resident_bytes: AtomicU64,
    probes: AtomicU64,
    probe_failures: AtomicU64,
    unattributed_probes: AtomicU64,
}

/// Point-in-time copy of [`PluginSystemMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub discovered: u64,
    pub loaded: u64,
    pub failed: u64,
    pub manifest_errors: u64,
    pub load_time_micros: u64,
    pub plugin_memory_bytes: i64,
    pub process_resident_bytes: u64,
    pub probes: u64,
    pub probe_failures: u64,
    pub unattributed_probes: u64,
}

impl PluginSystemMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_discovered(&self, count: usize) {
        let count = count as u64;
        self.discovered.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(PLUGINS_DISCOVERED_TOTAL).increment(count);
    }

    pub fn record_manifest_error(&self) {
        self.manifest_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MANIFEST_ERRORS_TOTAL).increment(1);
    }

    pub fn record_loaded(&self, plugin_id: &str, elapsed: Duration) {
        self.loaded.fetch_add(1, Ordering::Relaxed);
        self.add_load_time(elapsed);
        metrics::counter!(PLUGINS_LOADED_TOTAL).increment(1);
        metrics::histogram!(PLUGIN_LOAD_DURATION_SECONDS, "plugin" => plugin_id.to_string())
            .record(elapsed.as_secs_f64());
    }

    pub fn record_failed(&self, elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.add_load_time(elapsed);
        metrics::counter!(PLUGINS_FAILED_TOTAL).increment(1);
    }

    /// Total estimated memory of the currently loaded plugins.
    pub fn set_plugin_memory(&self, bytes: i64) {
        self.plugin_memory_bytes.store(bytes, Ordering::Relaxed);
        metrics::gauge!(PLUGIN_MEMORY_BYTES).set(bytes as f64);
    }

    pub fn set_process_resident(&self, bytes: u64) {
        self.process_resident_bytes.store(bytes, Ordering::Relaxed);
        metrics::gauge!(PROCESS_RESIDENT_BYTES).set(bytes as f64);
    }

    pub fn record_probe(&self, contract: &'static str, ok: bool) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(CONTRACT_PROBES_TOTAL, "contract" => contract).increment(1);
        if !ok {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(CONTRACT_PROBE_FAILURES_TOTAL, "contract" => contract).increment(1);
        }
    }

    pub fn record_unattributed(&self, count: usize) {
        if count == 0 {
            return;
        }
        let count = count as u64;
        self.unattributed_probes.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(UNATTRIBUTED_PROBES_TOTAL).increment(count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            discovered: self.discovered.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            manifest_errors: self.manifest_errors.load(Ordering::Relaxed),
            load_time_micros: self.load_time_micros.load(Ordering::Relaxed),
            plugin_memory_bytes: self.plugin_memory_bytes.load(Ordering::Relaxed),
            process_resident_bytes: self.process_resident_bytes.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            unattributed_probes: self.unattributed_probes.load(Ordering::Relaxed),
        }
    }

    fn add_load_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.load_time_micros.fetch_add(micros, Ordering::Relaxed);
    }
}
