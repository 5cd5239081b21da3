//! Job files and JSON reports.
//!
//! A job names a commitment, a pattern, and how hard to look:
//!
//! ```json
//! {
//!   "commitment": "02…",
//!   "pattern": { "substrings": ["GO", "BE"], "fuzzy": true },
//!   "mode": "guaranteed",
//!   "budget": 5000000
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use vanikeys_core::encoding::{authorized_key_line, FINGERPRINT_BODY_LEN};
use vanikeys_core::estimator::{estimate, estimate_in_text, format_count, Estimate};
use vanikeys_core::proof::SerializedProof;
use vanikeys_core::{submit_with, MatchResult, PatternSpec, Rarity, SearchMode, SearchOutcome, Searcher};

use crate::config::WorkerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Hex-encoded compressed commitment
    pub commitment: String,
    pub pattern: PatternSpec,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    /// Falls back to `search.default_budget`
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub start_index: u32,
}

fn default_mode() -> SearchMode {
    SearchMode::Guaranteed
}

impl Job {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse job JSON")
    }

    /// The budget to search with, checked against the configured ceiling.
    pub fn budget(&self, config: &WorkerConfig) -> Result<u64> {
        let budget = self.budget.unwrap_or(config.search.default_budget);
        anyhow::ensure!(
            budget <= config.search.max_budget,
            "job budget {} exceeds search.max_budget {}",
            budget,
            config.search.max_budget
        );
        Ok(budget)
    }

    pub fn commitment_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(self.commitment.trim()).context("commitment is not valid hex")
    }
}

/// Run `job` to completion (or cancellation) on `searcher`, logging progress.
pub fn run(searcher: &Searcher, job: &Job, budget: u64) -> Result<SearchOutcome> {
    let commitment = job.commitment_bytes()?;
    let outcome = submit_with(
        searcher,
        &commitment,
        &job.pattern,
        job.mode,
        job.start_index,
        budget,
        |p| {
            log::info!(
                "Progress: {} / {} ({:.1}%)",
                format_count(p.attempts),
                format_count(p.budget),
                p.attempts as f64 * 100.0 / p.budget as f64
            );
        },
    )?;
    Ok(outcome)
}

/// JSON form of a finished job.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeReport {
    Found {
        path_index: u32,
        public_key: String,
        fingerprint: String,
        authorized_key: String,
        rarity: Rarity,
        match_result: MatchResult,
        attempts: u64,
        proof: SerializedProof,
    },
    Incomplete {
        attempts: u64,
        message: &'static str,
    },
    Cancelled {
        attempts: u64,
    },
}

impl From<&SearchOutcome> for OutcomeReport {
    fn from(outcome: &SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Found(r) => OutcomeReport::Found {
                path_index: r.path_index,
                public_key: hex::encode(r.public_key.serialize()),
                fingerprint: r.fingerprint.to_string(),
                authorized_key: authorized_key_line(&r.public_key, "vanikeys"),
                rarity: r.match_result.rarity(),
                match_result: r.match_result.clone(),
                attempts: r.attempts,
                proof: r.proof.to_serialized(),
            },
            SearchOutcome::Incomplete { attempts } => OutcomeReport::Incomplete {
                attempts: *attempts,
                message: "not found within budget, try again or increase budget",
            },
            SearchOutcome::Cancelled { attempts } => OutcomeReport::Cancelled {
                attempts: *attempts,
            },
        }
    }
}

/// JSON form of `--estimate`.
#[derive(Debug, Serialize)]
pub struct EstimateReport {
    pub pattern: String,
    pub odds: String,
    /// One fixed window per substring.
    pub per_window: Estimate,
    /// Substrings anywhere in the fingerprint body.
    pub per_fingerprint: Estimate,
    pub budget: u64,
    /// P(at least one hit within `budget` attempts), from `per_fingerprint`.
    pub success_within_budget: f64,
}

impl EstimateReport {
    pub fn new(pattern: &PatternSpec, alphabet_size: u32, budget: u64) -> Self {
        let per_window = estimate(pattern, alphabet_size);
        let per_fingerprint = estimate_in_text(pattern, alphabet_size, FINGERPRINT_BODY_LEN);
        let p = per_fingerprint.exact_probability;
        // 1 - (1 - p)^budget, kept accurate when p is below f64 epsilon.
        let success_within_budget = -(budget as f64 * (-p).ln_1p()).exp_m1();

        EstimateReport {
            pattern: pattern.display(),
            odds: per_fingerprint.odds_display(),
            per_window,
            per_fingerprint,
            budget,
            success_within_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vanikeys_core::{commitment_from_seed, SearchConfig, Seed};

    fn commitment_hex() -> String {
        commitment_from_seed(&Seed::from([9u8; 32])).unwrap().to_hex()
    }

    fn searcher() -> Searcher {
        Searcher::new(SearchConfig {
            workers: 2,
            checkpoint_interval: 32,
            progress_interval: 1000,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_job_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"commitment":"{}","pattern":{{"substrings":["GO","BE"],"fuzzy":true}},"mode":"single_pull","start_index":5}}"#,
            commitment_hex()
        )
        .unwrap();

        let job = Job::from_file(file.path()).unwrap();
        assert_eq!(job.pattern.substrings, vec!["GO", "BE"]);
        assert!(job.pattern.fuzzy);
        assert!(!job.pattern.case_sensitive);
        assert_eq!(job.mode, SearchMode::SinglePull);
        assert_eq!(job.start_index, 5);
        assert_eq!(job.budget, None);
    }

    #[test]
    fn test_mode_defaults_to_guaranteed() {
        let job = Job::from_json(r#"{"commitment":"00","pattern":{"substrings":["A"]}}"#).unwrap();
        assert_eq!(job.mode, SearchMode::Guaranteed);
        assert!(Job::from_json(r#"{"pattern":{"substrings":["A"]}}"#).is_err());
    }

    #[test]
    fn test_budget_resolution() {
        let mut config = WorkerConfig::default();
        config.search.default_budget = 100;
        config.search.max_budget = 1000;

        let mut job = Job::from_json(r#"{"commitment":"00","pattern":{"substrings":["A"]}}"#).unwrap();
        assert_eq!(job.budget(&config).unwrap(), 100);

        job.budget = Some(1000);
        assert_eq!(job.budget(&config).unwrap(), 1000);

        job.budget = Some(1001);
        assert!(job.budget(&config).is_err());
    }

    #[test]
    fn test_run_single_pull_report() {
        let job = Job {
            commitment: commitment_hex(),
            pattern: PatternSpec::new(["QQQQQQ"]),
            mode: SearchMode::SinglePull,
            budget: None,
            start_index: 3,
        };
        let outcome = run(&searcher(), &job, 0).unwrap();
        let json = serde_json::to_value(OutcomeReport::from(&outcome)).unwrap();

        assert_eq!(json["status"], "found");
        assert_eq!(json["path_index"], 3);
        assert_eq!(json["attempts"], 1);
        assert!(json["fingerprint"].as_str().unwrap().starts_with("SHA256:"));
        assert_eq!(json["proof"]["path_index"], 3);
    }

    #[test]
    fn test_run_incomplete_report() {
        let job = Job {
            commitment: commitment_hex(),
            pattern: PatternSpec::new(["ZZZZZZZZZZ"]).case_sensitive(true),
            mode: SearchMode::Guaranteed,
            budget: Some(64),
            start_index: 0,
        };
        let outcome = run(&searcher(), &job, 64).unwrap();
        let json = serde_json::to_value(OutcomeReport::from(&outcome)).unwrap();
        assert_eq!(json["status"], "incomplete");
        assert_eq!(json["attempts"], 64);
    }

    #[test]
    fn test_run_rejects_bad_commitment() {
        let job = Job {
            commitment: "not hex".into(),
            pattern: PatternSpec::new(["A"]),
            mode: SearchMode::SinglePull,
            budget: None,
            start_index: 0,
        };
        assert!(run(&searcher(), &job, 1).is_err());
    }

    #[test]
    fn test_estimate_report() {
        let report = EstimateReport::new(&PatternSpec::new(["ab"]), 64, 1_000);
        assert_eq!(report.pattern, "ab");
        assert!(report.per_fingerprint.expected_attempts < report.per_window.expected_attempts);
        assert!(report.success_within_budget > 0.99);
        assert!(report.odds.starts_with("1 in "));
    }

    #[test]
    fn test_estimate_report_tiny_probability() {
        let pattern = PatternSpec::new(["ABCDEFGHJK"]).case_sensitive(true);
        let report = EstimateReport::new(&pattern, 64, 1_000_000);
        let p = report.per_fingerprint.exact_probability;

        assert!(p > 0.0 && p < f64::EPSILON);
        assert!(report.success_within_budget > 0.0);
        let expected = p * 1_000_000.0;
        assert!((report.success_within_budget - expected).abs() / expected < 1e-6);
    }
}
