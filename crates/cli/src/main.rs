//! datapolish - distributed dataset enhancement pipeline
//!
//! This binary provides the command-line interface for the datapolish system.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use datapolish_coordinator::{combine, Monitor};
use datapolish_core::config::Config;
use datapolish_core::layout::{Layout, RunManifest};
use datapolish_enhance::OllamaEnhancer;
use datapolish_partition::split;
use datapolish_worker::Processor;
use serde_json::Value;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datapolish")]
#[command(about = "Partition, enhance and recombine JSON datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true, default_value = "datapolish.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the input dataset into per-worker fragments
    Split,
    /// Run one worker over its fragment (resumes from a checkpoint if present)
    Work {
        /// 1-based worker id, matching the fragment to process
        #[arg(long)]
        worker_id: usize,
    },
    /// Monitor running workers until every one has completed
    Watch {
        /// Disable the live progress display
        #[arg(long)]
        no_display: bool,
    },
    /// Combine per-worker results into the final output document
    Combine,
    /// Split, wait for externally launched workers, then combine
    Run {
        /// Disable the live progress display
        #[arg(long)]
        no_display: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.validate()?;

    let layout = Layout::new(&config.fragment_dir, &config.result_dir);

    match cli.command {
        Commands::Split => {
            init_logging(cli.verbose)?;
            run_split(&config, &layout)
        }
        Commands::Work { worker_id } => {
            if worker_id == 0 || worker_id > config.workers {
                return Err(anyhow!(
                    "Invalid worker id {worker_id}: expected 1..={}",
                    config.workers
                ));
            }
            init_worker_logging(&layout.log_file(worker_id), cli.verbose)?;
            run_worker(&config, &layout, worker_id).await
        }
        Commands::Watch { no_display } => {
            init_logging(cli.verbose)?;
            run_watch(&config, &layout, !no_display).await
        }
        Commands::Combine => {
            init_logging(cli.verbose)?;
            run_combine(&config, &layout)
        }
        Commands::Run { no_display } => {
            init_logging(cli.verbose)?;
            run_split(&config, &layout)?;
            println!(
                "Fragments ready. Launch workers with `datapolish work --worker-id N` (N = 1..={})",
                config.workers
            );
            run_watch(&config, &layout, !no_display).await?;
            run_combine(&config, &layout)
        }
    }
}

fn filter_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    [
        "datapolish",
        "datapolish_core",
        "datapolish_enhance",
        "datapolish_partition",
        "datapolish_worker",
        "datapolish_coordinator",
    ]
    .map(|target| format!("{target}={level}"))
    .join(",")
}

/// Initialize logging to stderr
fn init_logging(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_directives(verbose))
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Initialize worker logging: stderr plus the worker's log file.
///
/// The file is opened in append mode so a resumed worker extends its log and
/// a monitor holding a byte offset never finds the file truncated under it.
fn init_worker_logging(log_path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory for {}", log_path.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directives(verbose)))
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn run_split(config: &Config, layout: &Layout) -> Result<()> {
    let partition = split(&config.input_file, config.workers, layout)
        .with_context(|| format!("Failed to split {}", config.input_file.display()))?;

    println!(
        "Split {} entries into {} fragments:",
        partition.total_entries,
        partition.fragments.len()
    );
    for fragment in &partition.fragments {
        println!(
            "  worker {}: {} entries [{}, {})",
            fragment.worker_id, fragment.entry_count, fragment.start_index, fragment.end_index
        );
    }
    Ok(())
}

async fn run_worker(config: &Config, layout: &Layout, worker_id: usize) -> Result<()> {
    let enhancer = OllamaEnhancer::new(&config.enhancer)?;
    let processor = Processor::new(
        worker_id,
        layout.clone(),
        config.worker.clone(),
        Arc::new(enhancer),
    );

    let outcome = processor.run().await?;
    info!(
        "Worker {worker_id} finished: {}/{} entries, {} degraded",
        outcome.processed, outcome.total, outcome.degraded
    );
    Ok(())
}

async fn run_watch(config: &Config, layout: &Layout, show_display: bool) -> Result<()> {
    let manifest = load_manifest(layout)?;
    let monitor = Monitor::new(layout.clone(), config.monitor.clone(), &manifest).await;
    monitor.wait_for_completion(show_display).await?;
    Ok(())
}

fn run_combine(config: &Config, layout: &Layout) -> Result<()> {
    let manifest = load_manifest(layout)?;

    for fragment in &manifest.fragments {
        let path = layout.result_file(fragment.worker_id);
        if !path.exists() {
            return Err(anyhow!(
                "Worker {} has not produced a result yet ({} missing)",
                fragment.worker_id,
                path.display()
            ));
        }
    }

    let text = std::fs::read_to_string(&config.input_file)
        .with_context(|| format!("Failed to read {}", config.input_file.display()))?;
    let original: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", config.input_file.display()))?;

    combine(layout, &manifest, &original, &config.output_file)?;
    println!(
        "Combined {} entries into {}",
        manifest.total_entries,
        config.output_file.display()
    );
    Ok(())
}

fn load_manifest(layout: &Layout) -> Result<RunManifest> {
    RunManifest::load(layout)?
        .ok_or_else(|| anyhow!("No run manifest found. Run `datapolish split` first"))
}
