//! tlsresume - TLS session cache simulator and inspector
//!
//! Main entry point for the tlsresume CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use tlsresume_config::LoggingConfig;

mod commands;

use commands::{config, inspect, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// tlsresume - TLS session cache simulator and inspector
#[derive(Parser)]
#[command(name = "tlsresume")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "TLSRESUME_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive client and server session caches with synthetic handshakes
    Simulate(simulate::SimulateArgs),

    /// List sessions persisted on disk
    Inspect(inspect::InspectArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

const CONSOLE_FILTER: &str = "tlsresume=info,tlsresume_cache=info,tlsresume_config=info,warn";
const CONSOLE_FILTER_VERBOSE: &str =
    "tlsresume=debug,tlsresume_cache=debug,tlsresume_config=debug,info";
const FILE_FILTER: &str = "tlsresume=trace,tlsresume_cache=trace,tlsresume_config=trace,info";

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = tlsresume_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    let logging = loaded.config.logging.clone().unwrap_or_default();
    let _guard = init_tracing(cli.verbose, &logging);

    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
        loaded,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
        Commands::Inspect(args) => inspect::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Initialize tracing: console (human-readable, stderr) plus an optional
/// daily-rolling file log. The returned guard must outlive the program.
fn init_tracing(verbose: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            CONSOLE_FILTER_VERBOSE
        } else {
            CONSOLE_FILTER
        })
    });

    let mut guard = None;
    let mut json_layer = None;
    let mut text_layer = None;

    if let Some(ref dir) = logging.dir {
        let file_appender = tracing_appender::rolling::daily(dir, "tlsresume.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        if logging.json {
            json_layer = Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new(FILE_FILTER)),
            );
        } else {
            text_layer = Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new(FILE_FILTER)),
            );
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(json_layer)
        .with(text_layer)
        .init();

    guard
}
