// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only status view over the loader's latest run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lablab_core::PluginHealth;
use serde::Serialize;

use crate::loader::{PluginLoader, PluginRecord, PluginState};
use crate::memory;
use crate::metrics::MetricsSnapshot;

/// Status of a single plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatusEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub state: PluginState,
    pub is_loaded: bool,
    pub load_error: Option<String>,
    pub load_duration_ms: f64,
    pub memory_usage_bytes: Option<i64>,
    pub capabilities: Vec<&'static str>,
    pub health: PluginHealth,
    pub health_message: Option<String>,
    pub health_since: DateTime<Utc>,
}

impl From<&PluginRecord> for PluginStatusEntry {
    fn from(record: &PluginRecord) -> Self {
        let health = record.health();
        Self {
            id: record.manifest.id.clone(),
            name: record.manifest.name.clone(),
            version: record.manifest.version.clone(),
            state: record.state,
            is_loaded: record.is_loaded(),
            load_error: record.load_error.clone(),
            load_duration_ms: record.load_duration.as_secs_f64() * 1000.0,
            memory_usage_bytes: record.memory_usage,
            capabilities: record.capabilities.clone(),
            health: health.health,
            health_message: health.message.clone(),
            health_since: health.since,
        }
    }
}

/// Aggregate status of the plugin system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub total_plugins: usize,
    pub loaded_plugins: usize,
    pub failed_plugins: usize,
    pub system_health: PluginHealth,
    /// Entries in discovery order.
    pub plugins: Vec<PluginStatusEntry>,
    pub metrics: MetricsSnapshot,
}

/// Roll plugin health up into one value.
///
/// Any failed load makes the system unhealthy. Otherwise the most severe
/// reported health wins; plugins that never reported are ignored, and an
/// empty or silent system is healthy.
pub fn system_health(plugins: &[PluginStatusEntry]) -> PluginHealth {
    if plugins.iter().any(|p| p.state == PluginState::Failed) {
        return PluginHealth::Unhealthy;
    }
    plugins
        .iter()
        .map(|p| p.health)
        .filter(|h| *h != PluginHealth::Unknown)
        .max_by_key(|h| h.severity())
        .unwrap_or(PluginHealth::Healthy)
}

/// Administrative queries over the plugin system.
#[derive(Debug, Clone)]
pub struct PluginAdminService {
    loader: Arc<PluginLoader>,
}

impl PluginAdminService {
    pub fn new(loader: Arc<PluginLoader>) -> Self {
        Self { loader }
    }

    /// Snapshot of every plugin from the latest run, plus current metrics.
    pub fn system_status(&self) -> SystemStatus {
        if let Some(rss) = memory::resident_bytes() {
            self.loader.metrics().set_process_resident(rss);
        }

        let plugins: Vec<PluginStatusEntry> = self
            .loader
            .current()
            .map(|run| run.records().iter().map(PluginStatusEntry::from).collect())
            .unwrap_or_default();
        let loaded_plugins = plugins.iter().filter(|p| p.is_loaded).count();

        SystemStatus {
            total_plugins: plugins.len(),
            loaded_plugins,
            failed_plugins: plugins.len() - loaded_plugins,
            system_health: system_health(&plugins),
            metrics: self.loader.metrics().snapshot(),
            plugins,
        }
    }

    /// Status of one plugin by id, compared case-insensitively.
    pub fn plugin(&self, id: &str) -> Option<PluginStatusEntry> {
        let run = self.loader.current()?;
        run.record(id).map(PluginStatusEntry::from)
    }
}
