// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lablab.toml` > `~/.config/lablab/lablab.toml` > `/etc/lablab/lablab.toml`
//! with environment variable overrides via `LABLAB_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LablabConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lablab/lablab.toml` (system-wide)
/// 3. `~/.config/lablab/lablab.toml` (user XDG config)
/// 4. `./lablab.toml` (local directory)
/// 5. `LABLAB_*` environment variables
pub fn load_config() -> Result<LablabConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
pub fn load_config_from_str(toml_content: &str) -> Result<LablabConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LablabConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LablabConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LablabConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LablabConfig::default()))
        .merge(Toml::file("/etc/lablab/lablab.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lablab/lablab.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("lablab.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `LABLAB_PLUGINS_PROBE_TIMEOUT_MS` must map to
/// `plugins.probe_timeout_ms`, not `plugins.probe.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("LABLAB_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to its dotted config key.
pub(crate) fn map_env_key(key: &str) -> String {
    key.replacen("logging_", "logging.", 1)
        .replacen("plugins_", "plugins.", 1)
        .replacen("metrics_", "metrics.", 1)
}
