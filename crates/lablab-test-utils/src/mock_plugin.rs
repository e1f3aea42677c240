// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock plugins with scripted behavior.
//!
//! Each [`MockBehavior`] has its own entry type, so a module file picks the
//! behavior. Tunables such as `delay_ms` or `reason` come from the module's
//! `[config]` table.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lablab_core::traits::diagnostic::{DiagnosticData, DiagnosticEvent, DiagnosticExportFormat};
use lablab_core::{
    CapabilitySet, DiagnosticProvider, HealthHandle, HealthStatus, LablabError, Plugin,
    PluginContext, PluginFactory, PluginHealth,
};
use tokio::sync::Mutex;

/// What a mock plugin does when loaded and probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Reports healthy, provides a well-behaved diagnostics instance.
    Healthy,
    /// Reports degraded with `reason` from config.
    Degraded,
    /// Loads fine, registers nothing, never reports health.
    Plain,
    /// `initialize` fails with `message` from config.
    InitFails,
    /// `initialize` panics.
    InitPanics,
    /// `initialize` sleeps `delay_ms` before succeeding.
    SlowInit,
    /// `collect_data` sleeps `delay_ms` (default 10s).
    SlowProbe,
    /// `collect_data` returns an error.
    FailingProbe,
    /// `log_event` panics.
    PanickingProbe,
    /// Every plugin of this type registers one process-wide instance.
    Shared,
}

impl MockBehavior {
    pub const ALL: [MockBehavior; 10] = [
        MockBehavior::Healthy,
        MockBehavior::Degraded,
        MockBehavior::Plain,
        MockBehavior::InitFails,
        MockBehavior::InitPanics,
        MockBehavior::SlowInit,
        MockBehavior::SlowProbe,
        MockBehavior::FailingProbe,
        MockBehavior::PanickingProbe,
        MockBehavior::Shared,
    ];

    pub fn entry_type(self) -> &'static str {
        match self {
            MockBehavior::Healthy => "mock.healthy",
            MockBehavior::Degraded => "mock.degraded",
            MockBehavior::Plain => "mock.plain",
            MockBehavior::InitFails => "mock.init-fails",
            MockBehavior::InitPanics => "mock.init-panics",
            MockBehavior::SlowInit => "mock.slow-init",
            MockBehavior::SlowProbe => "mock.slow-probe",
            MockBehavior::FailingProbe => "mock.failing-probe",
            MockBehavior::PanickingProbe => "mock.panicking-probe",
            MockBehavior::Shared => "mock.shared",
        }
    }

    fn registers_provider(self) -> bool {
        !matches!(self, MockBehavior::Plain)
    }
}

/// Calls observed by mock providers, as `"<plugin id>:<operation>"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Factory producing [`MockPlugin`]s of one behavior.
pub struct MockPluginFactory {
    behavior: MockBehavior,
    calls: CallLog,
}

impl MockPluginFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every probe call made on instances from this factory.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }
}

impl PluginFactory for MockPluginFactory {
    fn entry_type(&self) -> &str {
        self.behavior.entry_type()
    }

    fn create(&self) -> Result<Box<dyn Plugin>, LablabError> {
        Ok(Box::new(MockPlugin {
            behavior: self.behavior,
            calls: Arc::clone(&self.calls),
            provider: None,
        }))
    }
}

/// One factory per behavior.
pub fn mock_factories() -> Vec<Arc<dyn PluginFactory>> {
    MockBehavior::ALL
        .into_iter()
        .map(|b| Arc::new(MockPluginFactory::new(b)) as Arc<dyn PluginFactory>)
        .collect()
}

/// A plugin driven by [`MockBehavior`].
pub struct MockPlugin {
    behavior: MockBehavior,
    calls: CallLog,
    provider: Option<Arc<MockDiagnostics>>,
}

fn config_str(ctx: &PluginContext, key: &str, default: &str) -> String {
    ctx.config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

fn config_delay(ctx: &PluginContext, default_ms: u64) -> Duration {
    Duration::from_millis(
        ctx.config
            .get("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(default_ms),
    )
}

static SHARED: OnceLock<Arc<MockDiagnostics>> = OnceLock::new();

#[async_trait]
impl Plugin for MockPlugin {
    async fn initialize(&mut self, ctx: &PluginContext) -> Result<(), LablabError> {
        let mut probe_delay = Duration::ZERO;
        match self.behavior {
            MockBehavior::InitFails => {
                return Err(LablabError::plugin(config_str(
                    ctx,
                    "message",
                    "initialization refused",
                )));
            }
            MockBehavior::InitPanics => panic!("mock plugin panicked during initialize"),
            MockBehavior::SlowInit => tokio::time::sleep(config_delay(ctx, 50)).await,
            MockBehavior::SlowProbe => probe_delay = config_delay(ctx, 10_000),
            MockBehavior::Degraded => ctx.health().report(
                PluginHealth::Degraded,
                Some(config_str(ctx, "reason", "running degraded")),
            ),
            MockBehavior::Plain => {}
            _ => ctx.health().report(PluginHealth::Healthy, None),
        }

        if self.behavior.registers_provider() {
            let provider = if self.behavior == MockBehavior::Shared {
                Arc::clone(SHARED.get_or_init(|| {
                    Arc::new(MockDiagnostics::new(
                        "shared",
                        MockBehavior::Shared,
                        Duration::ZERO,
                        Arc::clone(&self.calls),
                        HealthHandle::new(),
                    ))
                }))
            } else {
                Arc::new(MockDiagnostics::new(
                    &ctx.plugin_id,
                    self.behavior,
                    probe_delay,
                    Arc::clone(&self.calls),
                    ctx.health().clone(),
                ))
            };
            self.provider = Some(provider);
        }
        Ok(())
    }

    fn register_capabilities(&self, capabilities: &mut CapabilitySet) -> Result<(), LablabError> {
        if let Some(provider) = &self.provider {
            capabilities.register::<dyn DiagnosticProvider>(provider.clone());
        }
        Ok(())
    }
}

/// Diagnostics provider used by mock plugins.
pub struct MockDiagnostics {
    name: String,
    behavior: MockBehavior,
    delay: Duration,
    calls: CallLog,
    health: HealthHandle,
}

impl MockDiagnostics {
    pub fn new(
        name: &str,
        behavior: MockBehavior,
        delay: Duration,
        calls: CallLog,
        health: HealthHandle,
    ) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay,
            calls,
            health,
        }
    }

    async fn record(&self, operation: &str) {
        self.calls
            .lock()
            .await
            .push(format!("{}:{operation}", self.name));
    }
}

#[async_trait]
impl DiagnosticProvider for MockDiagnostics {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect_data(&self) -> Result<DiagnosticData, LablabError> {
        self.record("collect_data").await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.behavior == MockBehavior::FailingProbe {
            return Err(LablabError::plugin("collector offline"));
        }
        Ok(DiagnosticData {
            provider: self.name.clone(),
            collected_at: Some(Utc::now()),
            ..Default::default()
        })
    }

    async fn check_health(&self) -> Result<HealthStatus, LablabError> {
        self.record("check_health").await;
        let report = self.health.current();
        Ok(match report.health {
            PluginHealth::Degraded => {
                HealthStatus::Degraded(report.message.clone().unwrap_or_default())
            }
            PluginHealth::Unhealthy => {
                HealthStatus::Unhealthy(report.message.clone().unwrap_or_default())
            }
            _ => HealthStatus::Healthy,
        })
    }

    async fn log_event(&self, event: DiagnosticEvent) -> Result<(), LablabError> {
        self.record("log_event").await;
        if self.behavior == MockBehavior::PanickingProbe {
            panic!("mock provider cannot log {}", event.category);
        }
        Ok(())
    }

    async fn export_data(&self, format: DiagnosticExportFormat) -> Result<Vec<u8>, LablabError> {
        self.record("export_data").await;
        Ok(match format {
            DiagnosticExportFormat::Json => format!("{{\"provider\":\"{}\"}}", self.name).into_bytes(),
            DiagnosticExportFormat::Csv => b"provider\n".to_vec(),
        })
    }
}
