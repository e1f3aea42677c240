// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lablab - a plugin host.
//!
//! This is the binary entry point: `lablab plugins list` and
//! `lablab plugins verify`.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod list;
mod verify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lablab_config::{ConfigError, LablabConfig};

/// Lablab - discover, load and verify plugins.
#[derive(Parser, Debug)]
#[command(name = "lablab", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and verify installed plugins.
    Plugins {
        #[command(subcommand)]
        action: PluginCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommands {
    /// Load every plugin and print its status.
    List {
        /// Plugin search roots (overrides configured paths).
        #[arg(long, num_args = 1..)]
        paths: Vec<String>,
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
        /// Append plugin system metrics in Prometheus text format.
        #[arg(long)]
        metrics: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Load plugins, probe their contracts and write a health snapshot.
    Verify {
        /// Snapshot file to write.
        #[arg(long, short)]
        output: PathBuf,
        /// Plugin search roots (overrides configured paths).
        #[arg(long, num_args = 1..)]
        paths: Vec<String>,
        /// Overall probe deadline in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Only these plugin ids (comma separated).
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,
        /// Skip these plugin ids (comma separated).
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            lablab_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    match cli.command {
        Some(Commands::Plugins { action }) => match action {
            PluginCommands::List {
                paths,
                json,
                metrics,
                plain,
            } => {
                let options = list::ListOptions {
                    paths,
                    json,
                    metrics: metrics || config.metrics.enabled,
                    plain,
                };
                if let Err(e) = list::run_list(&config, options).await {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
            PluginCommands::Verify {
                output,
                paths,
                timeout_ms,
                include,
                exclude,
                plain,
            } => {
                let options = verify::VerifyOptions {
                    output,
                    paths,
                    timeout_ms,
                    include,
                    exclude,
                    plain,
                };
                if let Err(e) = verify::run_verify(&config, options).await {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        },
        None => {
            println!("lablab: use --help for available commands");
        }
    }
}

/// Load configuration from `path` when given, otherwise from the XDG hierarchy.
fn load_config(path: Option<&std::path::Path>) -> Result<LablabConfig, Vec<ConfigError>> {
    match path {
        Some(path) => lablab_config::load_and_validate_path(path),
        None => lablab_config::load_and_validate(),
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lablab={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
