// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end verification: discovery, load, contract probes, snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lablab_plugin::builtin::PROCESS_DIAGNOSTICS_ENTRY_TYPE;
use lablab_plugin::{
    builtin_catalog, HealthSnapshot, PluginAdminService, PluginCatalog, PluginFilter,
    PluginLoader, ProbeReport, ProbeResult, ProbeRunner, ProbeSuite, SnapshotState,
};
use lablab_test_utils::{mock_factories, MockBehavior, PluginFixture};

const DIAGNOSTICS: &str = "DiagnosticProvider";

fn catalog() -> PluginCatalog {
    let mut catalog = builtin_catalog();
    for factory in mock_factories() {
        catalog.register(factory);
    }
    catalog
}

struct Verified {
    snapshot: HealthSnapshot,
    probes: ProbeReport,
    loader: Arc<PluginLoader>,
}

async fn verify(paths: &[PathBuf], filter: &PluginFilter, timeout: Duration) -> Verified {
    let loader = Arc::new(PluginLoader::with_catalog(catalog()));
    let admin = PluginAdminService::new(Arc::clone(&loader));
    let run = loader.discover_and_load(paths, filter).await;
    let suite = ProbeSuite::standard(ProbeRunner::with_metrics(Arc::clone(loader.metrics())));
    let probes = suite.run(&run, timeout).await;
    let snapshot = HealthSnapshot::build(&admin.system_status(), &probes, filter);
    Verified {
        snapshot,
        probes,
        loader,
    }
}

fn root(fixture: &PluginFixture) -> Vec<PathBuf> {
    vec![fixture.root().to_path_buf()]
}

// ---- Three-directory scenario ----

#[tokio::test]
async fn malformed_loaded_and_bad_magic_plugins() {
    let fixture = PluginFixture::new();
    fixture.plugin("incomplete").omit("version").write();
    fixture
        .plugin("diagnostics")
        .id("lablab.diagnostics")
        .name("Process Diagnostics")
        .capabilities(&[DIAGNOSTICS])
        .module_entry_type(PROCESS_DIAGNOSTICS_ENTRY_TYPE)
        .write();
    fixture
        .plugin("corrupt")
        .raw_module("corrupt.lbmod", b"\x7fELF\x02\x01\x01")
        .write();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(2)).await;
    let snapshot = &verified.snapshot;

    assert_eq!(snapshot.plugins.len(), 2);
    assert!(snapshot.plugin("incomplete").is_none());

    let diagnostics = snapshot.plugin("lablab.diagnostics").unwrap();
    assert_eq!(diagnostics.state, SnapshotState::Running);
    assert_eq!(diagnostics.name, "Process Diagnostics");
    assert_eq!(
        diagnostics.contract_probes.as_ref().unwrap()[DIAGNOSTICS],
        ProbeResult::passed()
    );

    let corrupt = snapshot.plugin("corrupt").unwrap();
    assert_eq!(corrupt.state, SnapshotState::Failed);
    assert_eq!(corrupt.error_message.as_deref(), Some("bad magic"));
    assert!(corrupt.contract_probes.is_none());

    let metrics = verified.loader.metrics().snapshot();
    assert_eq!(metrics.manifest_errors, 1);
    assert_eq!(metrics.probes, 1);
    assert_eq!(metrics.probe_failures, 0);
}

// ---- Deadline ----

#[tokio::test]
async fn slow_probe_times_out_within_the_deadline() {
    let fixture = PluginFixture::new();
    fixture.plugin("fast").module(MockBehavior::Healthy).write();
    fixture.plugin("hung").module(MockBehavior::SlowProbe).write();

    let started = Instant::now();
    let verified = verify(
        &root(&fixture),
        &PluginFilter::default(),
        Duration::from_millis(100),
    )
    .await;
    assert!(started.elapsed() < Duration::from_secs(3));

    let hung = &verified.probes.for_plugin("hung").unwrap()[DIAGNOSTICS];
    assert!(hung.probed);
    assert!(!hung.ok);
    let message = hung.message.as_deref().unwrap();
    assert!(message.contains("timed out"), "{message}");
    assert!(message.contains("collect_data"), "{message}");

    assert!(verified.probes.for_plugin("fast").unwrap()[DIAGNOSTICS].ok);
    assert_eq!(verified.loader.metrics().snapshot().probe_failures, 1);
}

// ---- Probe failures stay per plugin ----

#[tokio::test]
async fn failing_and_panicking_probes_are_isolated() {
    let fixture = PluginFixture::new();
    fixture.plugin("errors").module(MockBehavior::FailingProbe).write();
    fixture.plugin("panics").module(MockBehavior::PanickingProbe).write();
    fixture.plugin("passes").module(MockBehavior::Healthy).write();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(2)).await;
    let result = |id: &str| verified.probes.for_plugin(id).unwrap()[DIAGNOSTICS].clone();

    assert_eq!(
        result("errors").message.as_deref(),
        Some("collect_data failed: collector offline")
    );
    assert!(result("panics")
        .message
        .as_deref()
        .unwrap()
        .starts_with("log_event panicked"));
    assert!(result("passes").ok);
    assert_eq!(verified.probes.failures(), 2);
}

// ---- Include / exclude ----

#[tokio::test]
async fn excluded_plugins_are_neither_loaded_nor_probed() {
    let fixture = PluginFixture::new();
    for id in ["a", "b", "c"] {
        fixture.plugin(id).module(MockBehavior::Healthy).write();
    }

    let filter = PluginFilter::new(["a,b"], ["b"]);
    let verified = verify(&root(&fixture), &filter, Duration::from_secs(2)).await;

    assert_eq!(verified.snapshot.ids(), vec!["a"]);
    assert_eq!(verified.probes.plugins.keys().collect::<Vec<_>>(), vec!["a"]);
    let metrics = verified.loader.metrics().snapshot();
    assert_eq!(metrics.loaded, 1);
    assert_eq!(metrics.probes, 1);
    assert_eq!(verified.snapshot.filters.include, vec!["a", "b"]);
    assert_eq!(verified.snapshot.filters.exclude, vec!["b"]);
}

// ---- Attribution ----

#[tokio::test]
async fn shared_instances_are_counted_as_unattributed() {
    let fixture = PluginFixture::new();
    fixture.plugin("left").module(MockBehavior::Shared).write();
    fixture.plugin("right").module(MockBehavior::Shared).write();
    fixture.plugin("own").module(MockBehavior::Healthy).write();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(2)).await;

    assert_eq!(verified.probes.unattributed, 2);
    assert!(verified.probes.for_plugin("left").is_none());
    assert!(verified.probes.for_plugin("own").unwrap()[DIAGNOSTICS].ok);
    assert_eq!(verified.snapshot.unattributed_probes, 2);
}

#[tokio::test]
async fn declared_contract_without_instance_is_not_probed() {
    let fixture = PluginFixture::new();
    fixture
        .plugin("claims")
        .capabilities(&[DIAGNOSTICS])
        .module(MockBehavior::Plain)
        .write();
    fixture
        .plugin("broken")
        .capabilities(&[DIAGNOSTICS])
        .module(MockBehavior::InitFails)
        .write();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(2)).await;

    let claims = &verified.probes.for_plugin("claims").unwrap()[DIAGNOSTICS];
    assert_eq!(claims, &ProbeResult::not_probed("no registered instance"));
    let broken = &verified.probes.for_plugin("broken").unwrap()[DIAGNOSTICS];
    assert!(!broken.probed);
    assert_eq!(broken.message.as_deref(), Some("plugin not loaded"));
}

// ---- Snapshot states ----

#[tokio::test]
async fn degraded_plugins_stay_distinct_from_running() {
    let fixture = PluginFixture::new();
    fixture.plugin("ok").module(MockBehavior::Healthy).write();
    fixture
        .plugin("limping")
        .module_with_config(MockBehavior::Degraded, "reason = \"cache cold\"")
        .write();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(2)).await;
    let limping = verified.snapshot.plugin("limping").unwrap();
    assert_eq!(limping.state, SnapshotState::Degraded);
    assert_eq!(limping.health_status_reason.as_deref(), Some("cache cold"));
    assert!(limping.degraded_since.is_none());
    assert_eq!(
        verified.snapshot.plugin("ok").unwrap().state,
        SnapshotState::Running
    );
}

// ---- Ordering ----

#[tokio::test]
async fn snapshot_follows_search_path_order() {
    let first = PluginFixture::new();
    first.plugin("zeta").module(MockBehavior::Healthy).write();
    let second = PluginFixture::new();
    second.plugin("alpha").module(MockBehavior::Healthy).write();
    second.plugin("beta").raw_module("beta.lbmod", b"nope").write();

    let paths = vec![first.root().to_path_buf(), second.root().to_path_buf()];
    let verified = verify(&paths, &PluginFilter::default(), Duration::from_secs(2)).await;
    assert_eq!(verified.snapshot.ids(), vec!["zeta", "alpha", "beta"]);

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("health.json");
    verified.snapshot.write_to(&path).await.unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let ids: Vec<&str> = doc["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["Id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["zeta", "alpha", "beta"]);
}

// ---- Export and idempotence ----

fn normalized(path: &std::path::Path) -> serde_json::Value {
    let mut doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    doc["Timestamp"] = serde_json::Value::Null;
    if let Some(plugins) = doc["plugins"].as_array_mut() {
        for plugin in plugins.iter_mut() {
            plugin["LoadDurationMs"] = serde_json::Value::Null;
            plugin["MemoryUsageMB"] = serde_json::Value::Null;
        }
    }
    doc
}

#[tokio::test]
async fn verify_twice_yields_the_same_snapshot() {
    let fixture = PluginFixture::new();
    fixture
        .plugin("diagnostics")
        .capabilities(&[DIAGNOSTICS])
        .module_entry_type(PROCESS_DIAGNOSTICS_ENTRY_TYPE)
        .write();
    fixture.plugin("mock").module(MockBehavior::Healthy).write();
    fixture.plugin("corrupt").raw_module("x.lbmod", b"nope").write();
    let out = tempfile::tempdir().unwrap();
    let first = out.path().join("reports/first.json");
    let second = out.path().join("reports/second.json");

    let filter = PluginFilter::default();
    verify(&root(&fixture), &filter, Duration::from_secs(2))
        .await
        .snapshot
        .write_to(&first)
        .await
        .unwrap();
    verify(&root(&fixture), &filter, Duration::from_secs(2))
        .await
        .snapshot
        .write_to(&second)
        .await
        .unwrap();

    assert_eq!(normalized(&first), normalized(&second));
}

#[tokio::test]
async fn unwritable_output_is_an_error() {
    let fixture = PluginFixture::new();
    let out = tempfile::tempdir().unwrap();
    let blocker = out.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let verified = verify(&root(&fixture), &PluginFilter::default(), Duration::from_secs(1)).await;
    assert!(verified
        .snapshot
        .write_to(&blocker.join("snapshot.json"))
        .await
        .is_err());
}
