//! VaniKeys Worker: searcher-side process for derivation-path vanity jobs.
//!
//! Loads a config, reads a job (commitment + pattern + budget), runs the core
//! search engine, and prints the outcome as JSON. It only ever sees the
//! owner's commitment, never a seed.
//!
//! # Usage
//!
//! ```bash
//! vanikeys-worker --config worker.toml --job job.json
//! vanikeys-worker --job job.json --estimate   # Print odds and exit
//! vanikeys-worker --config worker.toml --validate
//! ```

mod config;
mod job;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use vanikeys_core::{SearchOutcome, Searcher};

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut job_path: Option<PathBuf> = None;
    let mut estimate_only = false;
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--job" | "-j" => {
                i += 1;
                if i < args.len() {
                    job_path = Some(PathBuf::from(&args[i]));
                } else {
                    anyhow::bail!("--job requires a path argument");
                }
            }
            "--estimate" => {
                estimate_only = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("vanikeys-worker {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut worker_config = match &config_path {
        Some(path) => config::WorkerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::WorkerConfig::default(),
    };

    // Apply env overrides
    worker_config.apply_env_overrides();

    // Validate
    worker_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &worker_config.worker.log_level);
    env_logger::init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  Threads:             {}", worker_config.threads());
        println!(
            "  Checkpoint interval: {} attempts",
            worker_config.worker.checkpoint_interval
        );
        println!(
            "  Progress interval:   {} attempts",
            worker_config.worker.progress_interval
        );
        println!(
            "  Default budget:      {}",
            worker_config.search.default_budget
        );
        println!("  Max budget:          {}", worker_config.search.max_budget);
        return Ok(());
    }

    let job_path = job_path.context("--job is required (see --help)")?;
    let search_job = job::Job::from_file(&job_path)?;
    let budget = search_job.budget(&worker_config)?;

    if estimate_only {
        let report = job::EstimateReport::new(
            &search_job.pattern,
            worker_config.search.alphabet_size,
            budget,
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let searcher = Arc::new(
        Searcher::new(worker_config.search_config()).context("Invalid search configuration")?,
    );
    let cancel = searcher.cancel_token();

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let outcome = rt.block_on(async {
        let worker = Arc::clone(&searcher);
        let mut handle =
            tokio::task::spawn_blocking(move || job::run(&worker, &search_job, budget));

        // Ctrl-C cancels cooperatively; the search still returns its attempt count.
        tokio::select! {
            result = &mut handle => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal. Cancelling search…");
                cancel.cancel();
                handle.await
            }
        }
    });

    let outcome = match outcome.context("Search task panicked")? {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Search failed: {:#}", e);
            std::process::exit(1);
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&job::OutcomeReport::from(&outcome))?
    );

    match outcome {
        SearchOutcome::Found(_) => Ok(()),
        SearchOutcome::Incomplete { attempts } => {
            log::warn!(
                "Not found within budget after {} attempts, try again or increase budget",
                attempts
            );
            std::process::exit(2);
        }
        SearchOutcome::Cancelled { .. } => std::process::exit(130),
    }
}

fn print_help() {
    println!(
        r#"VaniKeys Worker: derivation-path vanity search

USAGE:
    vanikeys-worker [OPTIONS] --job <PATH>

OPTIONS:
    -c, --config <PATH>   Config file path (defaults apply when omitted)
    -j, --job <PATH>      Job file (JSON: commitment, pattern, mode, budget)
    --estimate            Print the difficulty estimate for the job and exit
    --validate            Validate configuration and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    VANIKEYS_LOG_LEVEL            Log level (error/warn/info/debug/trace)
    VANIKEYS_THREADS              Search threads (0 = all cores)
    VANIKEYS_CHECKPOINT_INTERVAL  Attempts between cancellation checks
    VANIKEYS_PROGRESS_INTERVAL    Attempts between progress lines
    VANIKEYS_DEFAULT_BUDGET       Budget for jobs that do not set one
    VANIKEYS_MAX_BUDGET           Largest budget a job may request

EXIT STATUS:
    0    Found
    1    Error
    2    Not found within budget
    130  Cancelled
"#
    );
}
