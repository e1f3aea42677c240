// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lablab plugins verify` command implementation.
//!
//! Loads the plugins admitted by the include/exclude filter, probes every
//! registered contract under one deadline and writes the health snapshot.
//! Plugin failures are reported in the snapshot; only a failed export is an
//! error.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lablab_config::LablabConfig;
use lablab_core::LablabError;
use lablab_plugin::{
    builtin_catalog, HealthSnapshot, PluginAdminService, PluginFilter, PluginLoader, ProbeRunner,
    ProbeSuite,
};
use tracing::info;

/// Options of the `verify` command.
#[derive(Debug)]
pub struct VerifyOptions {
    pub output: PathBuf,
    pub paths: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub plain: bool,
}

impl VerifyOptions {
    /// Command-line filters win over configured ones, per list.
    fn filter(&self, config: &LablabConfig) -> PluginFilter {
        let include = if self.include.is_empty() {
            &config.plugins.include
        } else {
            &self.include
        };
        let exclude = if self.exclude.is_empty() {
            &config.plugins.exclude
        } else {
            &self.exclude
        };
        PluginFilter::new(include, exclude)
    }

    fn timeout(&self, config: &LablabConfig) -> Result<Duration, LablabError> {
        match self.timeout_ms.unwrap_or(config.plugins.probe_timeout_ms) {
            0 => Err(LablabError::Config(
                "--timeout-ms must be greater than zero".to_string(),
            )),
            ms => Ok(Duration::from_millis(ms)),
        }
    }
}

/// Run the `lablab plugins verify` command.
pub async fn run_verify(config: &LablabConfig, options: VerifyOptions) -> Result<(), LablabError> {
    let filter = options.filter(config);
    let timeout = options.timeout(config)?;
    let paths = config.plugins.search_paths(&options.paths);

    let loader = Arc::new(PluginLoader::with_catalog(builtin_catalog()));
    let snapshot = verify_plugins(Arc::clone(&loader), &paths, &filter, timeout).await;
    let written = write_snapshot(&snapshot, &options.output).await;

    if let Some(run) = loader.current() {
        run.shutdown().await;
    }
    written?;

    let use_color = !options.plain && std::io::stdout().is_terminal();
    println!("{}", success_line(&options.output, use_color));
    Ok(())
}

/// Load, probe and build the snapshot.
pub async fn verify_plugins(
    loader: Arc<PluginLoader>,
    paths: &[PathBuf],
    filter: &PluginFilter,
    timeout: Duration,
) -> HealthSnapshot {
    let run = loader.discover_and_load(paths, filter).await;

    let runner = ProbeRunner::with_metrics(Arc::clone(loader.metrics()));
    let probes = ProbeSuite::standard(runner).run(&run, timeout).await;

    // Read status after probing so health reported by the probes is included.
    let status = PluginAdminService::new(loader).system_status();
    info!(
        plugins = status.total_plugins,
        failed = status.failed_plugins,
        probe_failures = probes.failures(),
        unattributed = probes.unattributed,
        "verification complete"
    );
    HealthSnapshot::build(&status, &probes, filter)
}

async fn write_snapshot(snapshot: &HealthSnapshot, output: &Path) -> Result<(), LablabError> {
    snapshot.write_to(output).await?;
    Ok(())
}

fn success_line(output: &Path, use_color: bool) -> String {
    let check = if use_color {
        use colored::Colorize;
        "✓".green().to_string()
    } else {
        "✓".to_string()
    };
    format!("{check} Wrote plugin health snapshot: {}", output.display())
}
