// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin lifecycle trait and the factory that constructs plugin instances.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::LablabError;
use crate::traits::contract::CapabilitySet;
use crate::types::HealthHandle;

/// Host-provided context passed to [`Plugin::initialize`].
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Manifest id of the plugin being initialized.
    pub plugin_id: String,
    /// Directory the plugin was discovered in.
    pub plugin_dir: PathBuf,
    /// The `[config]` table from the plugin's module file, as JSON.
    pub config: serde_json::Value,
    health: HealthHandle,
}

impl PluginContext {
    pub fn new(
        plugin_id: impl Into<String>,
        plugin_dir: impl Into<PathBuf>,
        config: serde_json::Value,
        health: HealthHandle,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_dir: plugin_dir.into(),
            config,
            health,
        }
    }

    /// Health cell the plugin owns. Clone it to report from background tasks.
    pub fn health(&self) -> &HealthHandle {
        &self.health
    }
}

/// Lifecycle every loadable plugin implements: construct, initialize, register.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Prepare the plugin for use. Called exactly once, before registration.
    async fn initialize(&mut self, ctx: &PluginContext) -> Result<(), LablabError>;

    /// Declare the contracts this plugin implements.
    fn register_capabilities(&self, capabilities: &mut CapabilitySet) -> Result<(), LablabError>;

    /// Self-reported memory footprint in bytes, if the plugin tracks one.
    fn memory_usage(&self) -> Option<u64> {
        None
    }

    /// Release held resources.
    async fn shutdown(&self) -> Result<(), LablabError> {
        Ok(())
    }
}

/// Constructs plugin instances for one entry type.
///
/// Module files name an entry type; the host looks the factory up in its
/// catalog and calls [`PluginFactory::create`].
pub trait PluginFactory: Send + Sync {
    /// The entry type name module files refer to.
    fn entry_type(&self) -> &str;

    /// Construct a fresh, uninitialized plugin instance.
    fn create(&self) -> Result<Box<dyn Plugin>, LablabError>;
}
