// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lablab plugins list` command implementation.
//!
//! Discovers and loads every plugin under the search paths, then prints a
//! summary line followed by one line per plugin. With `--json` the full
//! admin status is printed instead; with `--metrics` the Prometheus text
//! rendering of the plugin system metrics follows.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use lablab_config::LablabConfig;
use lablab_core::{LablabError, PluginHealth};
use lablab_plugin::{
    builtin_catalog, PluginAdminService, PluginFilter, PluginLoader, PluginState,
    PluginStatusEntry, SystemStatus,
};
use lablab_prometheus::PrometheusExporter;

/// Options of the `list` command.
#[derive(Debug, Default)]
pub struct ListOptions {
    pub paths: Vec<String>,
    pub json: bool,
    pub metrics: bool,
    pub plain: bool,
}

/// Run the `lablab plugins list` command.
pub async fn run_list(config: &LablabConfig, options: ListOptions) -> Result<(), LablabError> {
    let exporter = if options.metrics {
        Some(PrometheusExporter::install()?)
    } else {
        None
    };

    let loader = Arc::new(PluginLoader::with_catalog(builtin_catalog()));
    let paths = config.plugins.search_paths(&options.paths);
    let filter = PluginFilter::new(&config.plugins.include, &config.plugins.exclude);
    let status = collect_status(Arc::clone(&loader), &paths, &filter).await;

    if options.json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| LablabError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{json}");
    } else {
        let use_color = !options.plain && std::io::stdout().is_terminal();
        print!("{}", render_status(&status, use_color));
    }

    if let Some(exporter) = exporter {
        println!();
        print!("{}", exporter.render());
    }

    if let Some(run) = loader.current() {
        run.shutdown().await;
    }
    Ok(())
}

/// Load plugins under `paths` and read the resulting status.
pub async fn collect_status(
    loader: Arc<PluginLoader>,
    paths: &[PathBuf],
    filter: &PluginFilter,
) -> SystemStatus {
    loader.discover_and_load(paths, filter).await;
    PluginAdminService::new(loader).system_status()
}

/// The `Total: N, Loaded: L, Failed: F, Health: H` line.
pub fn summary_line(status: &SystemStatus) -> String {
    format!(
        "Total: {}, Loaded: {}, Failed: {}, Health: {}",
        status.total_plugins, status.loaded_plugins, status.failed_plugins, status.system_health
    )
}

/// One plugin line: ` + name vX [Health]` for loaded plugins,
/// ` x name vX [Health] error` for failed ones.
pub fn plugin_line(entry: &PluginStatusEntry, use_color: bool) -> String {
    let loaded = entry.state == PluginState::Loaded;
    let detail = if loaded {
        entry.health_message.as_deref()
    } else {
        entry.load_error.as_deref()
    };

    let marker = if loaded { "+" } else { "x" };
    let health = format!("[{}]", entry.health);
    let (marker, health) = if use_color {
        use colored::Colorize;
        let marker = if loaded {
            marker.green().to_string()
        } else {
            marker.red().to_string()
        };
        let health = match entry.health {
            PluginHealth::Healthy => health.green().to_string(),
            PluginHealth::Degraded => health.yellow().to_string(),
            PluginHealth::Unhealthy => health.red().to_string(),
            PluginHealth::Unknown => health.dimmed().to_string(),
        };
        (marker, health)
    } else {
        (marker.to_string(), health)
    };

    let mut line = format!(" {marker} {} v{} {health}", entry.name, entry.version);
    if let Some(detail) = detail {
        line.push(' ');
        line.push_str(detail);
    }
    line
}

/// Render the full listing.
pub fn render_status(status: &SystemStatus, use_color: bool) -> String {
    let mut out = summary_line(status);
    out.push('\n');
    for entry in &status.plugins {
        out.push_str(&plugin_line(entry, use_color));
        out.push('\n');
    }
    out
}
