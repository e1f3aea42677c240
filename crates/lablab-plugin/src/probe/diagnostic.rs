// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probe sequence for [`DiagnosticProvider`].

use std::sync::Arc;

use chrono::Utc;
use lablab_core::traits::diagnostic::{DiagnosticEvent, DiagnosticExportFormat, DiagnosticLevel};
use lablab_core::{DiagnosticProvider, LablabError};
use tracing::debug;

use super::{ProbeSequence, ProbedContract};

/// Category of the event written by the `log_event` step.
pub const PROBE_EVENT_CATEGORY: &str = "RuntimeVerify";

impl ProbedContract for dyn DiagnosticProvider {
    /// collect, check health, log one event, export as JSON.
    fn probe_sequence() -> ProbeSequence<Self> {
        ProbeSequence::new()
            .operation("collect_data", collect_data)
            .operation("check_health", check_health)
            .operation("log_event", log_event)
            .operation("export_data", export_data)
    }
}

async fn collect_data(provider: Arc<dyn DiagnosticProvider>) -> Result<(), LablabError> {
    let data = provider.collect_data().await?;
    debug!(provider = provider.name(), metrics = data.metrics.len(), "collected diagnostics");
    Ok(())
}

async fn check_health(provider: Arc<dyn DiagnosticProvider>) -> Result<(), LablabError> {
    let status = provider.check_health().await?;
    debug!(provider = provider.name(), status = ?status, "provider health");
    Ok(())
}

async fn log_event(provider: Arc<dyn DiagnosticProvider>) -> Result<(), LablabError> {
    provider
        .log_event(DiagnosticEvent {
            timestamp: Utc::now(),
            level: DiagnosticLevel::Information,
            category: PROBE_EVENT_CATEGORY.to_string(),
            message: "ProbeEvent".to_string(),
            source: "lablab verify".to_string(),
        })
        .await
}

async fn export_data(provider: Arc<dyn DiagnosticProvider>) -> Result<(), LablabError> {
    let bytes = provider.export_data(DiagnosticExportFormat::Json).await?;
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .map_err(|e| LablabError::plugin(format!("JSON export is not valid JSON: {e}")))?;
    Ok(())
}
