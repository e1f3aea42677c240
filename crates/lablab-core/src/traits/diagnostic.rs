// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostics contract: data collection, health, event logging and export.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LablabError;
use crate::traits::contract::Contract;
use crate::types::HealthStatus;

/// Severity of a diagnostic event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum DiagnosticLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

/// An event recorded through a diagnostic provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub category: String,
    pub message: String,
    pub source: String,
}

/// A sample of collected diagnostic data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticData {
    pub provider: String,
    pub collected_at: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, f64>,
    pub properties: BTreeMap<String, String>,
}

/// Serialization format for [`DiagnosticProvider::export_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum DiagnosticExportFormat {
    Json,
    Csv,
}

/// A capability that observes the running system.
#[async_trait]
pub trait DiagnosticProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Collect a fresh data sample.
    async fn collect_data(&self) -> Result<DiagnosticData, LablabError>;

    /// Report the provider's view of system health.
    async fn check_health(&self) -> Result<HealthStatus, LablabError>;

    /// Record an event.
    async fn log_event(&self, event: DiagnosticEvent) -> Result<(), LablabError>;

    /// Export everything collected so far.
    async fn export_data(&self, format: DiagnosticExportFormat) -> Result<Vec<u8>, LablabError>;
}

impl Contract for dyn DiagnosticProvider {
    const NAME: &'static str = "DiagnosticProvider";
}
