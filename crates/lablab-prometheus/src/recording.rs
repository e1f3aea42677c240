// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions for the plugin system.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use lablab_plugin::metrics::{
    CONTRACT_PROBES_TOTAL, CONTRACT_PROBE_FAILURES_TOTAL, MANIFEST_ERRORS_TOTAL,
    PLUGINS_DISCOVERED_TOTAL, PLUGINS_FAILED_TOTAL, PLUGINS_LOADED_TOTAL,
    PLUGIN_LOAD_DURATION_SECONDS, PLUGIN_MEMORY_BYTES, PROCESS_RESIDENT_BYTES,
    UNATTRIBUTED_PROBES_TOTAL,
};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Register all Lablab metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(PLUGINS_DISCOVERED_TOTAL, "Plugin candidates found by discovery");
    describe_counter!(PLUGINS_LOADED_TOTAL, "Plugins loaded successfully");
    describe_counter!(PLUGINS_FAILED_TOTAL, "Plugins that failed to load");
    describe_counter!(MANIFEST_ERRORS_TOTAL, "Plugin directories skipped for unusable manifests");
    describe_histogram!(
        PLUGIN_LOAD_DURATION_SECONDS,
        Unit::Seconds,
        "Wall-clock time to load one plugin"
    );
    describe_gauge!(
        PLUGIN_MEMORY_BYTES,
        Unit::Bytes,
        "Estimated memory of loaded plugins"
    );
    describe_gauge!(PROCESS_RESIDENT_BYTES, Unit::Bytes, "Process resident set size");
    describe_counter!(CONTRACT_PROBES_TOTAL, "Contract probe runs per instance");
    describe_counter!(CONTRACT_PROBE_FAILURES_TOTAL, "Contract probe runs that failed");
    describe_counter!(
        UNATTRIBUTED_PROBES_TOTAL,
        "Probed instances without a single owning plugin"
    );
}
