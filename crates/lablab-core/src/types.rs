// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the plugin host and plugin implementations.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// File name of the per-plugin descriptor at the root of each plugin directory.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Extension of loadable module files.
pub const MODULE_EXTENSION: &str = "lbmod";

/// First line of every loadable module file.
pub const MODULE_MAGIC: &str = "LBMOD/1";

/// Health status reported by contract health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// Coarse health of a loaded plugin as tracked by the host.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum PluginHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl PluginHealth {
    /// Severity rank used when aggregating health; `Unknown` carries no signal.
    pub fn severity(self) -> u8 {
        match self {
            PluginHealth::Unknown => 0,
            PluginHealth::Healthy => 1,
            PluginHealth::Degraded => 2,
            PluginHealth::Unhealthy => 3,
        }
    }
}

impl From<&HealthStatus> for PluginHealth {
    fn from(status: &HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy => PluginHealth::Healthy,
            HealthStatus::Degraded(_) => PluginHealth::Degraded,
            HealthStatus::Unhealthy(_) => PluginHealth::Unhealthy,
        }
    }
}

/// Point-in-time health of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub health: PluginHealth,
    pub message: Option<String>,
    /// When `health` last changed.
    pub since: DateTime<Utc>,
}

impl HealthReport {
    fn unknown() -> Self {
        Self {
            health: PluginHealth::Unknown,
            message: None,
            since: Utc::now(),
        }
    }
}

/// Shared, independently synchronized health cell for one plugin.
///
/// The host hands a clone to the plugin at initialization. The plugin may
/// report at any time afterwards without coordinating with the loader; readers
/// always see a complete `HealthReport`.
#[derive(Debug, Clone)]
pub struct HealthHandle {
    inner: Arc<ArcSwap<HealthReport>>,
}

impl HealthHandle {
    /// Create a handle in the `Unknown` state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(HealthReport::unknown())),
        }
    }

    /// Publish a new health value. `since` only moves when the health changes.
    pub fn report(&self, health: PluginHealth, message: Option<String>) {
        self.inner.rcu(|current| {
            let since = if current.health == health {
                current.since
            } else {
                Utc::now()
            };
            HealthReport {
                health,
                message: message.clone(),
                since,
            }
        });
    }

    /// Publish the outcome of a health check.
    pub fn report_status(&self, status: &HealthStatus) {
        let message = match status {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(m) | HealthStatus::Unhealthy(m) => Some(m.clone()),
        };
        self.report(PluginHealth::from(status), message);
    }

    /// The latest report.
    pub fn current(&self) -> Arc<HealthReport> {
        self.inner.load_full()
    }
}

impl Default for HealthHandle {
    fn default() -> Self {
        Self::new()
    }
}
