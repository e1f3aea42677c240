// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health snapshot document written by `lablab plugins verify`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use lablab_core::PluginHealth;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::info;

use crate::admin::{PluginStatusEntry, SystemStatus};
use crate::error::ExportError;
use crate::filter::PluginFilter;
use crate::memory;
use crate::probe::{ProbeReport, ProbeResult};

/// Plugin state as shown in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SnapshotState {
    Running,
    Degraded,
    Failed,
}

impl SnapshotState {
    pub fn of(entry: &PluginStatusEntry) -> Self {
        match (entry.is_loaded, entry.health) {
            (false, _) => SnapshotState::Failed,
            (true, PluginHealth::Degraded) => SnapshotState::Degraded,
            (true, _) => SnapshotState::Running,
        }
    }
}

/// One plugin in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginSnapshot {
    pub id: String,
    pub name: String,
    pub version: String,
    pub state: SnapshotState,
    #[serde(rename = "MemoryUsageMB")]
    pub memory_usage_mb: u64,
    pub load_duration_ms: f64,
    pub health_status_reason: Option<String>,
    /// Always null: the document must not depend on when health was reported.
    pub degraded_since: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Always null: load failures carry their message only.
    pub stack_trace: Option<String>,
    /// Contract name -> probe result. `None` when nothing applied to the plugin.
    pub contract_probes: Option<BTreeMap<String, ProbeResult>>,
}

/// Filters the snapshot was taken with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilters {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// The snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Entries in discovery order.
    pub plugins: Vec<PluginSnapshot>,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Filters")]
    pub filters: SnapshotFilters,
    #[serde(rename = "UnattributedProbes")]
    pub unattributed_probes: usize,
}

impl HealthSnapshot {
    /// Combine status and probe results, restricted to what `filter` admits.
    pub fn build(status: &SystemStatus, probes: &ProbeReport, filter: &PluginFilter) -> Self {
        let plugins = status
            .plugins
            .iter()
            .filter(|entry| filter.allows(&entry.id))
            .map(|entry| PluginSnapshot {
                id: entry.id.clone(),
                name: entry.name.clone(),
                version: entry.version.clone(),
                state: SnapshotState::of(entry),
                memory_usage_mb: memory::to_mebibytes(entry.memory_usage_bytes),
                load_duration_ms: entry.load_duration_ms,
                health_status_reason: entry.health_message.clone(),
                degraded_since: None,
                error_message: entry.load_error.clone(),
                stack_trace: None,
                contract_probes: probes.for_plugin(&entry.id).cloned(),
            })
            .collect();

        Self {
            plugins,
            timestamp: Utc::now(),
            filters: SnapshotFilters {
                include: filter.include().to_vec(),
                exclude: filter.exclude().to_vec(),
            },
            unattributed_probes: probes.unattributed,
        }
    }

    /// Entry for `id`, compared case-insensitively.
    pub fn plugin(&self, id: &str) -> Option<&PluginSnapshot> {
        self.plugins.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    /// Plugin ids in document order.
    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot to `path`, creating parent directories and
    /// replacing any existing file.
    pub async fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ExportError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| ExportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), plugins = self.plugins.len(), "health snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PluginState;
    use crate::metrics::MetricsSnapshot;

    fn entry(id: &str, loaded: bool, health: PluginHealth) -> PluginStatusEntry {
        PluginStatusEntry {
            id: id.into(),
            name: format!("{id} name"),
            version: "1.0.0".into(),
            state: if loaded {
                PluginState::Loaded
            } else {
                PluginState::Failed
            },
            is_loaded: loaded,
            load_error: (!loaded).then(|| "bad magic".to_string()),
            load_duration_ms: 1.5,
            memory_usage_bytes: Some(5 * 1024 * 1024),
            capabilities: Vec::new(),
            health,
            health_message: (health == PluginHealth::Degraded).then(|| "slow disk".to_string()),
            health_since: Utc::now(),
        }
    }

    fn status(plugins: Vec<PluginStatusEntry>) -> SystemStatus {
        SystemStatus {
            total_plugins: plugins.len(),
            loaded_plugins: plugins.iter().filter(|p| p.is_loaded).count(),
            failed_plugins: plugins.iter().filter(|p| !p.is_loaded).count(),
            system_health: crate::admin::system_health(&plugins),
            plugins,
            metrics: MetricsSnapshot::default(),
        }
    }

    #[test]
    fn state_derivation() {
        assert_eq!(
            SnapshotState::of(&entry("a", false, PluginHealth::Healthy)),
            SnapshotState::Failed
        );
        assert_eq!(
            SnapshotState::of(&entry("a", true, PluginHealth::Degraded)),
            SnapshotState::Degraded
        );
        assert_eq!(
            SnapshotState::of(&entry("a", true, PluginHealth::Unknown)),
            SnapshotState::Running
        );
        assert_eq!(
            SnapshotState::of(&entry("a", true, PluginHealth::Unhealthy)),
            SnapshotState::Running
        );
    }

    #[test]
    fn build_maps_entries_and_probes() {
        let mut probes = ProbeReport::default();
        probes.plugins.insert(
            "ok".into(),
            BTreeMap::from([("DiagnosticProvider".to_string(), ProbeResult::passed())]),
        );
        probes.unattributed = 2;
        let status = status(vec![
            entry("ok", true, PluginHealth::Healthy),
            entry("slow", true, PluginHealth::Degraded),
            entry("broken", false, PluginHealth::Unhealthy),
        ]);

        let snapshot = HealthSnapshot::build(&status, &probes, &PluginFilter::default());
        assert_eq!(snapshot.plugins.len(), 3);
        assert_eq!(snapshot.unattributed_probes, 2);

        assert_eq!(snapshot.ids(), vec!["ok", "slow", "broken"]);

        let ok = snapshot.plugin("ok").unwrap();
        assert_eq!(ok.state, SnapshotState::Running);
        assert_eq!(ok.memory_usage_mb, 5);
        assert!(ok.contract_probes.as_ref().unwrap()["DiagnosticProvider"].ok);
        assert!(ok.degraded_since.is_none());

        let slow = snapshot.plugin("SLOW").unwrap();
        assert_eq!(slow.state, SnapshotState::Degraded);
        assert!(slow.degraded_since.is_none());
        assert_eq!(slow.health_status_reason.as_deref(), Some("slow disk"));

        let broken = snapshot.plugin("broken").unwrap();
        assert_eq!(broken.state, SnapshotState::Failed);
        assert_eq!(broken.error_message.as_deref(), Some("bad magic"));
        assert!(broken.contract_probes.is_none());
    }

    #[test]
    fn build_respects_filter() {
        let status = status(vec![
            entry("keep", true, PluginHealth::Healthy),
            entry("skip", true, PluginHealth::Healthy),
        ]);
        let filter = PluginFilter::new(["keep", "skip"], ["SKIP"]);
        let snapshot = HealthSnapshot::build(&status, &ProbeReport::default(), &filter);
        assert_eq!(snapshot.ids(), vec!["keep"]);
        assert_eq!(snapshot.filters.include, vec!["keep", "skip"]);
        assert_eq!(snapshot.filters.exclude, vec!["SKIP"]);
    }

    #[test]
    fn json_uses_expected_keys() {
        let status = status(vec![entry("p", true, PluginHealth::Healthy)]);
        let snapshot = HealthSnapshot::build(&status, &ProbeReport::default(), &PluginFilter::default());
        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();

        assert!(json["Timestamp"].is_string());
        assert!(json["Filters"]["include"].is_array());
        assert!(json["Filters"]["exclude"].is_array());
        let p = &json["plugins"][0];
        for key in [
            "Id",
            "Name",
            "Version",
            "State",
            "MemoryUsageMB",
            "LoadDurationMs",
            "HealthStatusReason",
            "DegradedSince",
            "ErrorMessage",
            "StackTrace",
            "ContractProbes",
        ] {
            assert!(p.get(key).is_some(), "missing {key}");
        }
        assert_eq!(p["Id"], "p");
        assert_eq!(p["State"], "Running");
    }

    #[test]
    fn build_keeps_status_order() {
        let status = status(vec![
            entry("zeta", true, PluginHealth::Healthy),
            entry("alpha", false, PluginHealth::Unknown),
            entry("mid", true, PluginHealth::Degraded),
        ]);
        let snapshot =
            HealthSnapshot::build(&status, &ProbeReport::default(), &PluginFilter::default());
        assert_eq!(snapshot.ids(), vec!["zeta", "alpha", "mid"]);

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();
        let ids: Vec<&str> = json["plugins"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["Id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn write_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/health.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale").unwrap();

        let snapshot = HealthSnapshot::build(
            &status(Vec::new()),
            &ProbeReport::default(),
            &PluginFilter::default(),
        );
        snapshot.write_to(&path).await.unwrap();
        let back: HealthSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, snapshot);

        let fresh = dir.path().join("a/b/c.json");
        snapshot.write_to(&fresh).await.unwrap();
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn write_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let snapshot = HealthSnapshot::build(
            &status(Vec::new()),
            &ProbeReport::default(),
            &PluginFilter::default(),
        );
        let err = snapshot
            .write_to(&blocker.join("health.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::CreateDir { .. }));
    }
}
