// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lablab plugin host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Lablab configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LablabConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Plugin discovery and verification settings.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Metrics recorder settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Search roots scanned for plugin directories. Empty means `default_path`.
    #[serde(default)]
    pub paths: Vec<String>,

    /// Search root used when `paths` is empty.
    #[serde(default = "default_plugin_path")]
    pub default_path: String,

    /// Deadline for a whole contract probe run, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Only plugins with these ids are loaded (empty means all).
    #[serde(default)]
    pub include: Vec<String>,

    /// Plugins with these ids are never loaded.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            default_path: default_plugin_path(),
            probe_timeout_ms: default_probe_timeout_ms(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_plugin_path() -> String {
    "plugins".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl PluginsConfig {
    /// Resolve the effective search roots.
    ///
    /// `overrides` (typically from the command line) replace the configured
    /// paths when non-empty. `~` and `$VAR` references are expanded; a path
    /// whose variables cannot be resolved is kept verbatim.
    pub fn search_paths(&self, overrides: &[String]) -> Vec<PathBuf> {
        let raw: Vec<&str> = if !overrides.is_empty() {
            overrides.iter().map(String::as_str).collect()
        } else if !self.paths.is_empty() {
            self.paths.iter().map(String::as_str).collect()
        } else {
            vec![self.default_path.as_str()]
        };

        raw.into_iter().map(expand_path).collect()
    }
}

fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!(path = raw, error = %e, "could not expand plugin path, using it verbatim");
            PathBuf::from(raw)
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup.
    #[serde(default)]
    pub enabled: bool,
}
