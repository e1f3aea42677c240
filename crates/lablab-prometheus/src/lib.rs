// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exporter for Lablab plugin system metrics.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The plugin
//! subsystem records through the facade; this crate installs the recorder
//! and renders the Prometheus text format.

pub mod recording;

use lablab_core::LablabError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use recording::register_metrics;

/// Installed Prometheus recorder.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process. Returns an error if a
    /// recorder is already installed.
    pub fn install() -> Result<Self, LablabError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LablabError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusExporter").finish_non_exhaustive()
    }
}
