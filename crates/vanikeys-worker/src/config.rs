//! Worker configuration: parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use vanikeys_core::SearchConfig;

/// Indices reachable under one parent.
const PATH_SPACE: u64 = 1 << 32;

/// Top-level worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Thread pool and logging
    #[serde(default)]
    pub worker: WorkerSection,

    /// Search limits
    #[serde(default)]
    pub search: SearchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Search threads; 0 means one per available core
    #[serde(default)]
    pub threads: usize,

    /// Attempts per thread between cancellation checks
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Attempts between progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            threads: 0,
            checkpoint_interval: default_checkpoint_interval(),
            progress_interval: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Budget used when a job does not name one
    #[serde(default = "default_budget")]
    pub default_budget: u64,

    /// Jobs asking for more are refused
    #[serde(default = "default_max_budget")]
    pub max_budget: u64,

    /// Fingerprint alphabet size used for estimates
    #[serde(default = "default_alphabet_size")]
    pub alphabet_size: u32,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            default_budget: default_budget(),
            max_budget: default_max_budget(),
            alphabet_size: default_alphabet_size(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_checkpoint_interval() -> u64 {
    4096
}

fn default_progress_interval() -> u64 {
    100_000
}

fn default_budget() -> u64 {
    10_000_000
}

fn default_max_budget() -> u64 {
    PATH_SPACE
}

fn default_alphabet_size() -> u32 {
    64
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl WorkerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: WorkerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `VANIKEYS_LOG_LEVEL`
    /// - `VANIKEYS_THREADS`
    /// - `VANIKEYS_CHECKPOINT_INTERVAL`
    /// - `VANIKEYS_PROGRESS_INTERVAL`
    /// - `VANIKEYS_DEFAULT_BUDGET`
    /// - `VANIKEYS_MAX_BUDGET`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VANIKEYS_LOG_LEVEL") {
            self.worker.log_level = v;
        }
        if let Ok(v) = std::env::var("VANIKEYS_THREADS") {
            if let Ok(n) = v.parse::<usize>() {
                self.worker.threads = n;
            }
        }
        if let Ok(v) = std::env::var("VANIKEYS_CHECKPOINT_INTERVAL") {
            if let Ok(n) = v.parse::<u64>() {
                self.worker.checkpoint_interval = n;
            }
        }
        if let Ok(v) = std::env::var("VANIKEYS_PROGRESS_INTERVAL") {
            if let Ok(n) = v.parse::<u64>() {
                self.worker.progress_interval = n;
            }
        }
        if let Ok(v) = std::env::var("VANIKEYS_DEFAULT_BUDGET") {
            if let Ok(n) = v.parse::<u64>() {
                self.search.default_budget = n;
            }
        }
        if let Ok(v) = std::env::var("VANIKEYS_MAX_BUDGET") {
            if let Ok(n) = v.parse::<u64>() {
                self.search.max_budget = n;
            }
        }
    }

    /// Thread count with 0 resolved to the available parallelism.
    pub fn threads(&self) -> usize {
        match self.worker.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Engine configuration for the core searcher.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            workers: self.threads(),
            checkpoint_interval: self.worker.checkpoint_interval,
            progress_interval: self.worker.progress_interval,
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            matches!(
                self.worker.log_level.as_str(),
                "error" | "warn" | "info" | "debug" | "trace"
            ),
            "worker.log_level must be one of error, warn, info, debug, trace"
        );

        anyhow::ensure!(
            self.worker.checkpoint_interval > 0,
            "worker.checkpoint_interval must be > 0"
        );

        anyhow::ensure!(
            self.worker.progress_interval > 0,
            "worker.progress_interval must be > 0"
        );

        anyhow::ensure!(
            self.search.max_budget <= PATH_SPACE,
            "search.max_budget must be <= 2^32"
        );

        anyhow::ensure!(
            self.search.default_budget <= self.search.max_budget,
            "search.default_budget must be <= search.max_budget"
        );

        anyhow::ensure!(
            self.search.alphabet_size >= 2,
            "search.alphabet_size must be >= 2"
        );

        self.search_config()
            .validate()
            .context("Invalid engine configuration")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
