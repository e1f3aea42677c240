// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract probes.
//!
//! A probe exercises every registered instance of a contract with a fixed
//! sequence of operations and attributes the outcome to the owning plugin.
//! All instances run concurrently under one absolute deadline; a panic, an
//! error or an expired deadline fails only that instance's result.
//!
//! New contracts become probeable by implementing [`ProbedContract`] and
//! adding them to a [`ProbeSuite`].

pub mod diagnostic;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use lablab_core::{Contract, LablabError};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{panic_message, ProbeError};
use crate::loader::DiscoveryRun;
use crate::metrics::PluginSystemMetrics;
use crate::registry::CapabilityRegistry;

/// Extra time allowed to collect a task after the deadline before giving up on it.
const JOIN_GRACE: Duration = Duration::from_millis(100);

type OperationFn<C> =
    Box<dyn Fn(Arc<C>) -> BoxFuture<'static, Result<(), LablabError>> + Send + Sync>;

struct ProbeOperation<C: ?Sized> {
    name: &'static str,
    run: OperationFn<C>,
}

/// Ordered operations run against each instance of contract `C`.
pub struct ProbeSequence<C: ?Sized> {
    operations: Vec<ProbeOperation<C>>,
}

impl<C: Contract + ?Sized> ProbeSequence<C> {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Append an operation. It passes when its future resolves to `Ok`.
    pub fn operation<F, Fut>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LablabError>> + Send + 'static,
    {
        self.operations.push(ProbeOperation {
            name,
            run: Box::new(move |instance| f(instance).boxed()),
        });
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.operations.iter().map(|op| op.name).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<C: Contract + ?Sized> Default for ProbeSequence<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A contract with a statically declared probe sequence.
pub trait ProbedContract: Contract {
    fn probe_sequence() -> ProbeSequence<Self>;
}

/// Outcome of probing one contract for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeResult {
    /// Whether an instance was found and exercised.
    pub probed: bool,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProbeResult {
    pub fn passed() -> Self {
        Self {
            probed: true,
            ok: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            probed: true,
            ok: false,
            message: Some(message.into()),
        }
    }

    pub fn not_probed(message: impl Into<String>) -> Self {
        Self {
            probed: false,
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// Results of probing one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractProbeReport {
    pub contract: &'static str,
    /// Plugin id -> result. A plugin with several instances keeps its first failure.
    pub results: BTreeMap<String, ProbeResult>,
    /// Instances probed whose owner could not be determined.
    pub unattributed: usize,
}

impl ContractProbeReport {
    fn new(contract: &'static str) -> Self {
        Self {
            contract,
            results: BTreeMap::new(),
            unattributed: 0,
        }
    }

    fn merge(&mut self, plugin_id: String, result: ProbeResult) {
        match self.results.entry(plugin_id) {
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().ok && !result.ok {
                    slot.insert(result);
                }
            }
        }
    }
}

/// Runs probe sequences against registry contents.
#[derive(Debug, Clone, Default)]
pub struct ProbeRunner {
    metrics: Option<Arc<PluginSystemMetrics>>,
}

impl ProbeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<PluginSystemMetrics>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// Probe every instance of `C` in `registry`, finishing by `deadline`.
    pub async fn probe<C: Contract + ?Sized>(
        &self,
        registry: &CapabilityRegistry,
        sequence: Arc<ProbeSequence<C>>,
        deadline: Instant,
    ) -> ContractProbeReport {
        let instances = registry.attributed::<C>();
        let tasks: Vec<_> = instances
            .iter()
            .map(|(instance, _)| {
                tokio::spawn(run_sequence(
                    Arc::clone(&sequence),
                    Arc::clone(instance),
                    deadline,
                ))
            })
            .collect();

        let mut report = ContractProbeReport::new(C::NAME);
        for ((_, owner), task) in instances.into_iter().zip(tasks) {
            let abort = task.abort_handle();
            let outcome = match tokio::time::timeout_at(deadline + JOIN_GRACE, task).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => Err(ProbeError::Panicked {
                    operation: "probe",
                    message: e.to_string(),
                }),
                Err(_) => {
                    abort.abort();
                    Err(ProbeError::Timeout { operation: "probe" })
                }
            };

            let result = match &outcome {
                Ok(()) => ProbeResult::passed(),
                Err(e) => ProbeResult::failed(e.to_string()),
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_probe(C::NAME, result.ok);
            }

            match owner {
                Some(plugin_id) => {
                    match &outcome {
                        Ok(()) => debug!(plugin = %plugin_id, contract = C::NAME, "contract probe passed"),
                        Err(e) => warn!(
                            plugin = %plugin_id,
                            contract = C::NAME,
                            error = %e,
                            "contract probe failed"
                        ),
                    }
                    report.merge(plugin_id, result);
                }
                None => {
                    debug!(
                        contract = C::NAME,
                        ok = result.ok,
                        "probed instance has no single owning plugin"
                    );
                    report.unattributed += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_unattributed(report.unattributed);
        }
        report
    }
}

async fn run_sequence<C: Contract + ?Sized>(
    sequence: Arc<ProbeSequence<C>>,
    instance: Arc<C>,
    deadline: Instant,
) -> Result<(), ProbeError> {
    for op in &sequence.operations {
        let call = AssertUnwindSafe((op.run)(Arc::clone(&instance))).catch_unwind();
        match tokio::time::timeout_at(deadline, call).await {
            Err(_) => return Err(ProbeError::Timeout { operation: op.name }),
            Ok(Err(payload)) => {
                return Err(ProbeError::Panicked {
                    operation: op.name,
                    message: panic_message(payload.as_ref()),
                });
            }
            Ok(Ok(Err(source))) => {
                return Err(ProbeError::Operation {
                    operation: op.name,
                    source,
                });
            }
            Ok(Ok(Ok(()))) => {}
        }
    }
    Ok(())
}

#[async_trait]
trait ErasedProbe: Send + Sync {
    fn contract(&self) -> &'static str;

    async fn run(
        &self,
        runner: &ProbeRunner,
        registry: &CapabilityRegistry,
        deadline: Instant,
    ) -> ContractProbeReport;
}

struct TypedProbe<C: ?Sized> {
    sequence: Arc<ProbeSequence<C>>,
}

#[async_trait]
impl<C: Contract + ?Sized> ErasedProbe for TypedProbe<C> {
    fn contract(&self) -> &'static str {
        C::NAME
    }

    async fn run(
        &self,
        runner: &ProbeRunner,
        registry: &CapabilityRegistry,
        deadline: Instant,
    ) -> ContractProbeReport {
        runner
            .probe(registry, Arc::clone(&self.sequence), deadline)
            .await
    }
}

/// Probe results for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Plugin id -> contract name -> result.
    pub plugins: BTreeMap<String, BTreeMap<String, ProbeResult>>,
    /// Probed instances not attributable to a single plugin, across contracts.
    pub unattributed: usize,
}

impl ProbeReport {
    pub fn for_plugin(&self, plugin_id: &str) -> Option<&BTreeMap<String, ProbeResult>> {
        self.plugins.get(plugin_id)
    }

    /// Attributed results that did not pass.
    pub fn failures(&self) -> usize {
        self.plugins
            .values()
            .flat_map(BTreeMap::values)
            .filter(|r| r.probed && !r.ok)
            .count()
    }
}

/// The set of contracts probed by a verification run.
pub struct ProbeSuite {
    runner: ProbeRunner,
    probes: Vec<Box<dyn ErasedProbe>>,
}

impl ProbeSuite {
    /// An empty suite.
    pub fn new(runner: ProbeRunner) -> Self {
        Self {
            runner,
            probes: Vec::new(),
        }
    }

    /// Suite covering every contract the host knows how to probe.
    pub fn standard(runner: ProbeRunner) -> Self {
        Self::new(runner).with::<dyn lablab_core::DiagnosticProvider>()
    }

    /// Add a contract using its declared sequence.
    pub fn with<C: ProbedContract + ?Sized>(self) -> Self {
        self.with_sequence(C::probe_sequence())
    }

    /// Add a contract with an explicit sequence.
    pub fn with_sequence<C: Contract + ?Sized>(mut self, sequence: ProbeSequence<C>) -> Self {
        self.probes.push(Box::new(TypedProbe {
            sequence: Arc::new(sequence),
        }));
        self
    }

    /// Contract names in the order they were added.
    pub fn contracts(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.contract()).collect()
    }

    /// Probe every contract against `run`, all under one deadline of `timeout`.
    ///
    /// Plugins whose manifest declares a contract that has no registered
    /// instance get a not-probed result for it.
    pub async fn run(&self, run: &DiscoveryRun, timeout: Duration) -> ProbeReport {
        let started = Instant::now();
        let deadline = started + timeout;
        let registry = run.registry();

        let reports = join_all(
            self.probes
                .iter()
                .map(|probe| probe.run(&self.runner, registry, deadline)),
        )
        .await;

        let mut report = ProbeReport::default();
        for contract_report in reports {
            let contract = contract_report.contract;
            report.unattributed += contract_report.unattributed;
            for (plugin_id, result) in contract_report.results {
                report
                    .plugins
                    .entry(plugin_id)
                    .or_default()
                    .insert(contract.to_string(), result);
            }

            for record in run.records() {
                if !record.manifest.declares(contract) {
                    continue;
                }
                let message = if record.is_loaded() {
                    "no registered instance"
                } else {
                    "plugin not loaded"
                };
                report
                    .plugins
                    .entry(record.id().to_string())
                    .or_default()
                    .entry(contract.to_string())
                    .or_insert_with(|| ProbeResult::not_probed(message));
            }
        }

        info!(
            contracts = self.probes.len(),
            plugins = report.plugins.len(),
            failures = report.failures(),
            unattributed = report.unattributed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "contract probes finished"
        );
        report
    }
}

impl std::fmt::Debug for ProbeSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSuite")
            .field("runner", &self.runner)
            .field("contracts", &self.contracts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityRegistryBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Counter: Send + Sync {
        fn bump(&self) -> usize;
    }

    impl Contract for dyn Counter {
        const NAME: &'static str = "Counter";
    }

    #[derive(Default)]
    struct Tally(AtomicUsize);

    impl Counter for Tally {
        fn bump(&self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    struct Stuck;

    impl Counter for Stuck {
        fn bump(&self) -> usize {
            0
        }
    }

    fn counting_sequence() -> ProbeSequence<dyn Counter> {
        ProbeSequence::new()
            .operation("bump", |c: Arc<dyn Counter>| async move {
                c.bump();
                Ok(())
            })
            .operation("check", |c: Arc<dyn Counter>| async move {
                if c.bump() == 0 {
                    std::future::pending::<()>().await;
                }
                Ok(())
            })
    }

    fn deadline(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn probe_result_serializes_pascal_case_and_skips_empty_message() {
        let json = serde_json::to_value(ProbeResult::passed()).unwrap();
        assert_eq!(json, serde_json::json!({"Probed": true, "Ok": true}));
        let json = serde_json::to_value(ProbeResult::failed("x")).unwrap();
        assert_eq!(json["Message"], "x");
    }

    #[test]
    fn sequence_keeps_operation_order() {
        assert_eq!(counting_sequence().names(), vec!["bump", "check"]);
        assert!(ProbeSequence::<dyn Counter>::new().is_empty());
    }

    #[tokio::test]
    async fn every_operation_runs_in_order() {
        let tally = Arc::new(Tally::default());
        let mut builder = CapabilityRegistryBuilder::new();
        builder.register::<dyn Counter>(tally.clone(), "p");
        let registry = builder.publish();

        let report = ProbeRunner::new()
            .probe(&registry, Arc::new(counting_sequence()), deadline(1_000))
            .await;
        assert_eq!(report.results["p"], ProbeResult::passed());
        assert_eq!(tally.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hung_instance_times_out_without_blocking_others() {
        let mut builder = CapabilityRegistryBuilder::new();
        builder.register::<dyn Counter>(Arc::new(Stuck), "stuck");
        builder.register::<dyn Counter>(Arc::new(Tally::default()), "fine");
        let registry = builder.publish();

        let started = std::time::Instant::now();
        let report = ProbeRunner::new()
            .probe(&registry, Arc::new(counting_sequence()), deadline(50))
            .await;
        assert!(started.elapsed() < Duration::from_secs(2));

        let stuck = &report.results["stuck"];
        assert!(stuck.probed && !stuck.ok);
        assert!(stuck.message.as_deref().unwrap().contains("timed out"));
        assert!(stuck.message.as_deref().unwrap().contains("'check'"));
        assert_eq!(report.results["fine"], ProbeResult::passed());
    }

    #[tokio::test]
    async fn errors_and_panics_fail_only_their_instance() {
        let sequence = ProbeSequence::<dyn Counter>::new().operation(
            "bump",
            |c: Arc<dyn Counter>| async move {
                match c.bump() {
                    0 => Err(LablabError::plugin("refused")),
                    1 => Ok(()),
                    _ => panic!("unreachable count"),
                }
            },
        );
        let twice = Arc::new(Tally::default());
        twice.bump();

        let mut builder = CapabilityRegistryBuilder::new();
        builder.register::<dyn Counter>(Arc::new(Stuck), "refuses");
        builder.register::<dyn Counter>(twice, "panics");
        builder.register::<dyn Counter>(Arc::new(Tally::default()), "passes");
        let registry = builder.publish();

        let report = ProbeRunner::new()
            .probe(&registry, Arc::new(sequence), deadline(1_000))
            .await;
        assert_eq!(
            report.results["refuses"].message.as_deref(),
            Some("bump failed: refused")
        );
        assert!(report.results["panics"]
            .message
            .as_deref()
            .unwrap()
            .contains("panicked"));
        assert!(report.results["passes"].ok);
    }

    #[tokio::test]
    async fn unowned_instances_are_counted_not_attributed() {
        let shared: Arc<dyn Counter> = Arc::new(Tally::default());
        let mut builder = CapabilityRegistryBuilder::new();
        builder.register_host::<dyn Counter>(Arc::new(Tally::default()));
        builder.register(shared.clone(), "a");
        builder.register(shared, "b");
        let registry = builder.publish();

        let metrics = Arc::new(PluginSystemMetrics::new());
        let report = ProbeRunner::with_metrics(metrics.clone())
            .probe(
                &registry,
                Arc::new(ProbeSequence::<dyn Counter>::new()),
                deadline(1_000),
            )
            .await;
        assert!(report.results.is_empty());
        assert_eq!(report.unattributed, 3);
        assert_eq!(metrics.snapshot().unattributed_probes, 3);
        assert_eq!(metrics.snapshot().probes, 3);
    }

    #[test]
    fn merge_keeps_first_failure() {
        let mut report = ContractProbeReport::new("Counter");
        report.merge("p".into(), ProbeResult::passed());
        report.merge("p".into(), ProbeResult::failed("first"));
        report.merge("p".into(), ProbeResult::failed("second"));
        assert_eq!(report.results["p"].message.as_deref(), Some("first"));
    }

    #[test]
    fn suite_lists_contracts() {
        let suite = ProbeSuite::standard(ProbeRunner::new()).with_sequence(counting_sequence());
        assert_eq!(suite.contracts(), vec!["DiagnosticProvider", "Counter"]);
    }
}
