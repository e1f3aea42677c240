// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery and loading.
//!
//! Discovery walks each search path (sorted subdirectories first, then the
//! root itself), parses manifests and resolves duplicate ids. Loading runs
//! every candidate on its own task. Capability registrations are committed
//! to the registry in discovery order once all loads have finished, and the
//! registry is then published.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use lablab_core::{
    CapabilityRegistration, CapabilitySet, HealthHandle, HealthReport, Plugin, PluginContext,
    MANIFEST_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, warn};

use crate::catalog::PluginCatalog;
use crate::error::{panic_message, LoadError};
use crate::filter::PluginFilter;
use crate::manifest::{parse_manifest_file, PluginManifest};
use crate::memory;
use crate::metrics::PluginSystemMetrics;
use crate::module::{resolve_entry_module, CatalogModuleLoader, ModuleLoader};
use crate::registry::{CapabilityRegistry, CapabilityRegistryBuilder};

/// Outcome of a load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum PluginState {
    Loaded,
    Failed,
}

/// A plugin directory with a valid manifest, not yet loaded.
#[derive(Debug, Clone)]
pub struct PluginCandidate {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
}

/// Everything known about one discovered plugin after its load attempt.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
    pub state: PluginState,
    pub load_error: Option<String>,
    pub load_duration: Duration,
    /// Estimated bytes attributable to the plugin. May be negative when the
    /// process shrank while the plugin loaded.
    pub memory_usage: Option<i64>,
    /// Contract names the plugin registered, in registration order.
    pub capabilities: Vec<&'static str>,
    health: HealthHandle,
}

impl PluginRecord {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn is_loaded(&self) -> bool {
        self.state == PluginState::Loaded
    }

    /// Latest health the plugin reported.
    pub fn health(&self) -> Arc<HealthReport> {
        self.health.current()
    }

    pub fn health_handle(&self) -> &HealthHandle {
        &self.health
    }
}

struct LoadedPlugin {
    id: String,
    plugin: Box<dyn Plugin>,
}

/// Result of one discovery-and-load pass.
///
/// Holds the loaded plugin instances, so they live as long as the run does.
pub struct DiscoveryRun {
    records: Vec<PluginRecord>,
    registry: Arc<CapabilityRegistry>,
    instances: Vec<LoadedPlugin>,
}

impl DiscoveryRun {
    /// Records in discovery order.
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Record by id, compared case-insensitively.
    pub fn record(&self, id: &str) -> Option<&PluginRecord> {
        self.records
            .iter()
            .find(|r| r.manifest.id.eq_ignore_ascii_case(id))
    }

    pub fn loaded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_loaded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.len() - self.loaded_count()
    }

    /// Ask every loaded plugin to release its resources.
    pub async fn shutdown(&self) {
        for instance in &self.instances {
            if let Err(e) = instance.plugin.shutdown().await {
                warn!(plugin = %instance.id, error = %e, "plugin shutdown failed");
            }
        }
    }
}

impl std::fmt::Debug for DiscoveryRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryRun")
            .field("records", &self.records)
            .field("registry", &self.registry)
            .field("instances", &self.instances.len())
            .finish()
    }
}

struct Instance {
    plugin: Box<dyn Plugin>,
    registrations: Vec<CapabilityRegistration>,
}

struct LoadOutcome {
    result: Result<Instance, LoadError>,
    elapsed: Duration,
    memory: Option<i64>,
}

/// Discovers plugins on disk and loads them through a [`ModuleLoader`].
pub struct PluginLoader {
    modules: Arc<dyn ModuleLoader>,
    metrics: Arc<PluginSystemMetrics>,
    current: ArcSwapOption<DiscoveryRun>,
}

impl PluginLoader {
    pub fn new(modules: Arc<dyn ModuleLoader>) -> Self {
        Self {
            modules,
            metrics: Arc::new(PluginSystemMetrics::new()),
            current: ArcSwapOption::empty(),
        }
    }

    /// Loader resolving module files against `catalog`.
    pub fn with_catalog(catalog: PluginCatalog) -> Self {
        Self::new(Arc::new(CatalogModuleLoader::new(catalog)))
    }

    /// Share an existing metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<PluginSystemMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PluginSystemMetrics> {
        &self.metrics
    }

    /// The most recently completed run, if any.
    pub fn current(&self) -> Option<Arc<DiscoveryRun>> {
        self.current.load_full()
    }

    /// Find plugin candidates under `paths`.
    ///
    /// Directories without a manifest are skipped silently; an unusable
    /// manifest is logged and skipped. When two candidates share an id the
    /// later one replaces the earlier one.
    pub async fn discover(&self, paths: &[PathBuf]) -> Vec<PluginCandidate> {
        let mut slots: Vec<Option<PluginCandidate>> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for root in paths {
            for dir in plugin_dirs(root).await {
                let manifest_path = dir.join(MANIFEST_FILE_NAME);
                if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
                    continue;
                }
                let manifest = match parse_manifest_file(&manifest_path).await {
                    Ok(manifest) => manifest,
                    Err(e) => {
                        self.metrics.record_manifest_error();
                        warn!(
                            path = %manifest_path.display(),
                            error = %e,
                            "skipping plugin with unusable manifest"
                        );
                        continue;
                    }
                };

                let key = manifest.id_key();
                if let Some(previous) = by_id.get(&key).and_then(|&i| slots[i].take()) {
                    warn!(
                        plugin = %manifest.id,
                        kept = %dir.display(),
                        discarded = %previous.dir.display(),
                        "duplicate plugin id, keeping the later discovery"
                    );
                }
                by_id.insert(key, slots.len());
                slots.push(Some(PluginCandidate { manifest, dir }));
            }
        }

        let candidates: Vec<PluginCandidate> = slots.into_iter().flatten().collect();
        self.metrics.record_discovered(candidates.len());
        debug!(count = candidates.len(), "plugin discovery finished");
        candidates
    }

    /// Load `candidates` concurrently and publish their capabilities.
    ///
    /// Records come back in candidate order regardless of completion order.
    pub async fn load_candidates(&self, candidates: Vec<PluginCandidate>) -> Arc<DiscoveryRun> {
        let tasks: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                let health = HealthHandle::new();
                let task = tokio::spawn(load_one(
                    candidate.clone(),
                    Arc::clone(&self.modules),
                    health.clone(),
                ));
                (health, task)
            })
            .collect();

        let mut builder = CapabilityRegistryBuilder::new();
        let mut records = Vec::with_capacity(candidates.len());
        let mut instances = Vec::new();

        for (candidate, (health, task)) in candidates.into_iter().zip(tasks) {
            let outcome = task.await.unwrap_or_else(|e| LoadOutcome {
                result: Err(LoadError::Panicked(e.to_string())),
                elapsed: Duration::ZERO,
                memory: None,
            });
            records.push(self.settle(candidate, health, outcome, &mut builder, &mut instances));
        }

        let plugin_memory: i64 = records.iter().filter_map(|r| r.memory_usage).sum();
        self.metrics.set_plugin_memory(plugin_memory);

        let registry = builder.publish();
        let run = Arc::new(DiscoveryRun {
            records,
            registry,
            instances,
        });
        info!(
            total = run.records.len(),
            loaded = run.loaded_count(),
            failed = run.failed_count(),
            capabilities = run.registry.len(),
            "plugin loading complete"
        );
        self.current.store(Some(Arc::clone(&run)));
        run
    }

    /// [`discover`](Self::discover), filter, then [`load_candidates`](Self::load_candidates).
    pub async fn discover_and_load(
        &self,
        paths: &[PathBuf],
        filter: &PluginFilter,
    ) -> Arc<DiscoveryRun> {
        let candidates = filter.apply(self.discover(paths).await);
        self.load_candidates(candidates).await
    }

    fn settle(
        &self,
        candidate: PluginCandidate,
        health: HealthHandle,
        outcome: LoadOutcome,
        builder: &mut CapabilityRegistryBuilder,
        instances: &mut Vec<LoadedPlugin>,
    ) -> PluginRecord {
        let PluginCandidate { manifest, dir } = candidate;
        match outcome.result {
            Ok(instance) => {
                let capabilities: Vec<&'static str> = instance
                    .registrations
                    .iter()
                    .map(CapabilityRegistration::contract_name)
                    .collect();
                for registration in instance.registrations {
                    builder.register_erased(registration, Some(manifest.id.clone()));
                }
                self.metrics.record_loaded(&manifest.id, outcome.elapsed);
                info!(
                    plugin = %manifest.id,
                    version = %manifest.version,
                    capabilities = capabilities.len(),
                    duration_ms = outcome.elapsed.as_millis() as u64,
                    "plugin loaded"
                );
                instances.push(LoadedPlugin {
                    id: manifest.id.clone(),
                    plugin: instance.plugin,
                });
                PluginRecord {
                    manifest,
                    dir,
                    state: PluginState::Loaded,
                    load_error: None,
                    load_duration: outcome.elapsed,
                    memory_usage: outcome.memory,
                    capabilities,
                    health,
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.metrics.record_failed(outcome.elapsed);
                warn!(
                    plugin = %manifest.id,
                    dir = %dir.display(),
                    error = %message,
                    "plugin failed to load"
                );
                PluginRecord {
                    manifest,
                    dir,
                    state: PluginState::Failed,
                    load_error: Some(message),
                    load_duration: outcome.elapsed,
                    memory_usage: None,
                    capabilities: Vec::new(),
                    health,
                }
            }
        }
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("metrics", &self.metrics)
            .field("has_run", &self.current.load().is_some())
            .finish_non_exhaustive()
    }
}

/// Candidate directories under one search path: sorted children, then the root.
async fn plugin_dirs(root: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %root.display(), error = %e, "search path not readable, skipping");
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
                    dirs.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %root.display(), error = %e, "failed to list search path");
                break;
            }
        }
    }
    dirs.sort();
    dirs.push(root.to_path_buf());
    dirs
}

async fn load_one(
    candidate: PluginCandidate,
    modules: Arc<dyn ModuleLoader>,
    health: HealthHandle,
) -> LoadOutcome {
    let started = Instant::now();
    let rss_before = memory::resident_bytes();

    let result = AssertUnwindSafe(instantiate(&candidate, modules.as_ref(), health))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(LoadError::Panicked(panic_message(payload.as_ref()))));

    let elapsed = started.elapsed();
    let memory = match &result {
        Ok(instance) => instance
            .plugin
            .memory_usage()
            .map(|bytes| i64::try_from(bytes).unwrap_or(i64::MAX))
            .or_else(|| memory::delta(rss_before, memory::resident_bytes())),
        Err(_) => None,
    };

    LoadOutcome {
        result,
        elapsed,
        memory,
    }
}

async fn instantiate(
    candidate: &PluginCandidate,
    modules: &dyn ModuleLoader,
    health: HealthHandle,
) -> Result<Instance, LoadError> {
    let entry = resolve_entry_module(&candidate.dir, &candidate.manifest).await?;
    let module = modules.load(&entry).await?;
    debug!(
        plugin = %candidate.manifest.id,
        entry_type = %module.entry_type,
        module = %entry.display(),
        "module resolved"
    );

    let mut plugin = module.plugin;
    let ctx = PluginContext::new(
        candidate.manifest.id.clone(),
        candidate.dir.clone(),
        module.config,
        health,
    );
    plugin.initialize(&ctx).await.map_err(LoadError::Initialize)?;

    let mut capabilities = CapabilitySet::new();
    plugin
        .register_capabilities(&mut capabilities)
        .map_err(LoadError::Register)?;

    Ok(Instance {
        plugin,
        registrations: capabilities.into_registrations(),
    })
}
