// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process diagnostics plugin.
//!
//! Provides [`DiagnosticProvider`] over the host process itself: uptime and
//! resident memory samples, a bounded event buffer, and JSON/CSV export.
//!
//! Module config keys:
//! - `max_events` (default 256): event buffer capacity
//! - `memory_warn_mb`: resident size above which health is degraded

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use lablab_core::traits::diagnostic::{
    DiagnosticData, DiagnosticEvent, DiagnosticExportFormat, DiagnosticLevel,
};
use lablab_core::{
    CapabilitySet, DiagnosticProvider, HealthHandle, HealthStatus, LablabError, Plugin,
    PluginContext, PluginFactory,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::memory;

/// Entry type module files use to load this plugin.
pub const PROCESS_DIAGNOSTICS_ENTRY_TYPE: &str = "lablab.process-diagnostics";

const DEFAULT_MAX_EVENTS: usize = 256;
const MAX_SAMPLES: usize = 64;

/// Factory for [`ProcessDiagnosticsPlugin`].
#[derive(Debug, Default)]
pub struct ProcessDiagnosticsFactory;

impl PluginFactory for ProcessDiagnosticsFactory {
    fn entry_type(&self) -> &str {
        PROCESS_DIAGNOSTICS_ENTRY_TYPE
    }

    fn create(&self) -> Result<Box<dyn Plugin>, LablabError> {
        Ok(Box::new(ProcessDiagnosticsPlugin::default()))
    }
}

#[derive(Debug, Default)]
pub struct ProcessDiagnosticsPlugin {
    provider: Option<Arc<ProcessDiagnostics>>,
}

#[async_trait]
impl Plugin for ProcessDiagnosticsPlugin {
    async fn initialize(&mut self, ctx: &PluginContext) -> Result<(), LablabError> {
        let max_events = match ctx.config.get("max_events") {
            None => DEFAULT_MAX_EVENTS,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    LablabError::Config(format!("max_events must be a positive integer, got {v}"))
                })?,
        };
        let memory_warn_bytes = match ctx.config.get("memory_warn_mb") {
            None => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|mb| mb.checked_mul(1024 * 1024))
                    .ok_or_else(|| {
                        LablabError::Config(format!(
                            "memory_warn_mb must be a non-negative integer of at most {} MiB, got {v}",
                            u64::MAX / (1024 * 1024)
                        ))
                    })?,
            ),
        };

        let provider = ProcessDiagnostics::new(
            ctx.plugin_id.clone(),
            max_events,
            memory_warn_bytes,
            ctx.health().clone(),
        );
        provider.refresh_health();
        info!(plugin = %ctx.plugin_id, max_events, "process diagnostics initialized");
        self.provider = Some(Arc::new(provider));
        Ok(())
    }

    fn register_capabilities(&self, capabilities: &mut CapabilitySet) -> Result<(), LablabError> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| LablabError::Internal("registration before initialize".into()))?;
        capabilities.register::<dyn DiagnosticProvider>(provider);
        Ok(())
    }

    fn memory_usage(&self) -> Option<u64> {
        let provider = self.provider.as_ref()?;
        Some((provider.max_events * std::mem::size_of::<DiagnosticEvent>()) as u64)
    }
}

#[derive(Debug, Serialize)]
struct Export<'a> {
    provider: &'a str,
    exported_at: chrono::DateTime<Utc>,
    samples: &'a VecDeque<DiagnosticData>,
    events: &'a VecDeque<DiagnosticEvent>,
}

/// [`DiagnosticProvider`] over the current process.
#[derive(Debug)]
pub struct ProcessDiagnostics {
    name: String,
    started: Instant,
    max_events: usize,
    memory_warn_bytes: Option<u64>,
    events: Mutex<VecDeque<DiagnosticEvent>>,
    samples: Mutex<VecDeque<DiagnosticData>>,
    health: HealthHandle,
}

impl ProcessDiagnostics {
    pub fn new(
        name: impl Into<String>,
        max_events: usize,
        memory_warn_bytes: Option<u64>,
        health: HealthHandle,
    ) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
            max_events,
            memory_warn_bytes,
            events: Mutex::new(VecDeque::new()),
            samples: Mutex::new(VecDeque::new()),
            health,
        }
    }

    fn assess(&self) -> HealthStatus {
        match (memory::resident_bytes(), self.memory_warn_bytes) {
            (Some(rss), Some(limit)) if rss > limit => HealthStatus::Degraded(format!(
                "resident memory {} MB above {} MB",
                rss / (1024 * 1024),
                limit / (1024 * 1024)
            )),
            _ => HealthStatus::Healthy,
        }
    }

    fn refresh_health(&self) -> HealthStatus {
        let status = self.assess();
        self.health.report_status(&status);
        status
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl DiagnosticProvider for ProcessDiagnostics {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect_data(&self) -> Result<DiagnosticData, LablabError> {
        let mut data = DiagnosticData {
            provider: self.name.clone(),
            collected_at: Some(Utc::now()),
            ..Default::default()
        };
        data.metrics.insert(
            "uptime_seconds".into(),
            self.started.elapsed().as_secs_f64(),
        );
        if let Some(rss) = memory::resident_bytes() {
            data.metrics.insert("resident_bytes".into(), rss as f64);
        }
        data.metrics.insert(
            "buffered_events".into(),
            self.events.lock().await.len() as f64,
        );
        data.properties
            .insert("pid".into(), std::process::id().to_string());

        let mut samples = self.samples.lock().await;
        if samples.len() == MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(data.clone());
        Ok(data)
    }

    async fn check_health(&self) -> Result<HealthStatus, LablabError> {
        Ok(self.refresh_health())
    }

    async fn log_event(&self, event: DiagnosticEvent) -> Result<(), LablabError> {
        match event.level {
            DiagnosticLevel::Trace => trace!(category = %event.category, "{}", event.message),
            DiagnosticLevel::Debug | DiagnosticLevel::Information => {
                debug!(category = %event.category, "{}", event.message)
            }
            DiagnosticLevel::Warning => warn!(category = %event.category, "{}", event.message),
            DiagnosticLevel::Error | DiagnosticLevel::Critical => {
                error!(category = %event.category, "{}", event.message)
            }
        }
        let mut events = self.events.lock().await;
        if events.len() == self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    async fn export_data(&self, format: DiagnosticExportFormat) -> Result<Vec<u8>, LablabError> {
        let events = self.events.lock().await;
        match format {
            DiagnosticExportFormat::Json => {
                let samples = self.samples.lock().await;
                let export = Export {
                    provider: &self.name,
                    exported_at: Utc::now(),
                    samples: &samples,
                    events: &events,
                };
                serde_json::to_vec_pretty(&export)
                    .map_err(|e| LablabError::Internal(format!("diagnostics export: {e}")))
            }
            DiagnosticExportFormat::Csv => {
                let mut out = String::from("timestamp,level,category,message,source\n");
                for event in events.iter() {
                    out.push_str(&format!(
                        "{},{},{},{},{}\n",
                        event.timestamp.to_rfc3339(),
                        event.level,
                        csv_field(&event.category),
                        csv_field(&event.message),
                        csv_field(&event.source),
                    ));
                }
                Ok(out.into_bytes())
            }
        }
    }
}
