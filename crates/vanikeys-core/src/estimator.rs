//! Difficulty estimation for vanity patterns.
//!
//! Substrings are treated as independent events. That overstates the odds of
//! short substrings sharing one fingerprint (their candidate positions
//! overlap) and ignores the left-to-right ordering constraint, so figures
//! here are estimates for pricing and UX, never a bound on the search.

use std::time::Duration;

use serde::Serialize;

use crate::matcher::{fuzzy_group, PatternSpec};

/// Difficulty tier, by expected attempts.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Trivial,
    Easy,
    Moderate,
    Hard,
    Extreme,
}

impl Difficulty {
    fn from_attempts(attempts: f64) -> Self {
        if attempts < 1e4 {
            Difficulty::Trivial
        } else if attempts < 1e6 {
            Difficulty::Easy
        } else if attempts < 1e8 {
            Difficulty::Moderate
        } else if attempts < 1e10 {
            Difficulty::Hard
        } else {
            Difficulty::Extreme
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Trivial => "trivial",
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::Extreme => "extreme",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Estimate {
    /// Probability that one fingerprint satisfies every substring.
    pub exact_probability: f64,
    /// `1 / exact_probability`, saturating at `u64::MAX`.
    pub expected_attempts: u64,
    /// log10 of the expected attempts; stays finite when the count saturates.
    pub log10_attempts: f64,
    /// `partial_probabilities[k]` = P(at least k of n substrings match).
    pub partial_probabilities: Vec<f64>,
    pub difficulty: Difficulty,
}

/// Probability that a single window of text equals `substring`.
///
/// Each character accepts one symbol, doubled when it is fuzzy-eligible and
/// doubled again when it is a letter under case-insensitive matching.
pub fn substring_probability(
    substring: &str,
    alphabet_size: u32,
    fuzzy: bool,
    case_sensitive: bool,
) -> f64 {
    let alphabet = f64::from(alphabet_size.max(1));
    substring
        .chars()
        .map(|c| {
            let mut accepted = 1.0;
            if fuzzy && fuzzy_group(c, case_sensitive).is_some() {
                accepted *= 2.0;
            }
            if !case_sensitive && c.is_ascii_alphabetic() {
                accepted *= 2.0;
            }
            (accepted / alphabet).min(1.0)
        })
        .product()
}

/// Estimate the difficulty of `pattern` over an alphabet of `alphabet_size`.
pub fn estimate(pattern: &PatternSpec, alphabet_size: u32) -> Estimate {
    let probs = pattern
        .substrings
        .iter()
        .map(|s| substring_probability(s, alphabet_size, pattern.fuzzy, pattern.case_sensitive))
        .collect();
    build(probs)
}

/// Like [`estimate`], but accounts for the substring appearing anywhere in a
/// text of `text_len` characters (e.g. a 43-character fingerprint body).
pub fn estimate_in_text(pattern: &PatternSpec, alphabet_size: u32, text_len: usize) -> Estimate {
    let probs = pattern
        .substrings
        .iter()
        .map(|s| {
            let len = s.chars().count();
            if len > text_len {
                return 0.0;
            }
            let positions = (text_len - len + 1) as f64;
            let p = substring_probability(s, alphabet_size, pattern.fuzzy, pattern.case_sensitive);
            (p * positions).min(1.0)
        })
        .collect();
    build(probs)
}

fn build(probs: Vec<f64>) -> Estimate {
    // Sum in log space so the attempt magnitude survives when the product underflows.
    let log10_p: f64 = probs.iter().map(|p| p.log10()).sum();
    let exact_probability: f64 = probs.iter().product();
    let log10_attempts = if log10_p.is_finite() {
        -log10_p
    } else {
        f64::INFINITY
    };

    let (expected_attempts, difficulty) = expected_attempts(exact_probability);
    let difficulty = if log10_attempts >= 10.0 {
        Difficulty::Extreme
    } else {
        difficulty
    };

    Estimate {
        exact_probability,
        expected_attempts,
        log10_attempts,
        partial_probabilities: at_least(&probs),
        difficulty,
    }
}

fn expected_attempts(p: f64) -> (u64, Difficulty) {
    if p <= 0.0 || !p.is_finite() {
        return (u64::MAX, Difficulty::Extreme);
    }
    let attempts = (1.0 / p).ceil();
    if !attempts.is_finite() || attempts >= u64::MAX as f64 {
        return (u64::MAX, Difficulty::Extreme);
    }
    (attempts as u64, Difficulty::from_attempts(attempts))
}

/// Survival function of the Poisson binomial over `probs`.
///
/// Returns `n + 1` entries; entry `k` is P(at least k successes).
fn at_least(probs: &[f64]) -> Vec<f64> {
    // exact[j] = P(exactly j successes so far)
    let mut exact = vec![0.0; probs.len() + 1];
    exact[0] = 1.0;
    for (i, p) in probs.iter().enumerate() {
        for j in (1..=i + 1).rev() {
            exact[j] = exact[j] * (1.0 - p) + exact[j - 1] * p;
        }
        exact[0] *= 1.0 - p;
    }

    let mut survival = vec![0.0; exact.len()];
    let mut acc = 0.0;
    for k in (0..exact.len()).rev() {
        acc += exact[k];
        survival[k] = acc.min(1.0);
    }
    survival[0] = 1.0;
    survival
}

impl Estimate {
    /// P(at least `k` substrings match); zero past the pattern length.
    pub fn at_least(&self, k: usize) -> f64 {
        self.partial_probabilities.get(k).copied().unwrap_or(0.0)
    }

    /// "1 in 4.2B" style odds.
    pub fn odds_display(&self) -> String {
        if self.expected_attempts == u64::MAX {
            if self.log10_attempts.is_finite() {
                return format!("1 in 10^{:.0}", self.log10_attempts);
            }
            return "1 in ∞".to_string();
        }
        format!("1 in {}", format_count(self.expected_attempts))
    }

    /// Expected wall time at `keys_per_sec`.
    pub fn estimated_duration(&self, keys_per_sec: u64) -> Duration {
        if keys_per_sec == 0 {
            return Duration::from_secs(u64::MAX);
        }
        Duration::from_secs(self.expected_attempts / keys_per_sec)
    }
}

/// Format a count as "38.1B", "195.1K", etc.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000_000_000 {
        format!("{:.1}T", n as f64 / 1_000_000_000_000.0)
    } else if n >= 1_000_000_000 {
        format!("{:.1}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Format a duration as "5.3 hours", "2.5 minutes", "45 seconds", etc.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();

    if secs >= 365 * 86400 {
        format!("{:.1} years", secs as f64 / (365.0 * 86400.0))
    } else if secs >= 86400 {
        format!("{:.1} days", secs as f64 / 86400.0)
    } else if secs >= 3600 {
        format!("{:.1} hours", secs as f64 / 3600.0)
    } else if secs >= 60 {
        format!("{:.1} minutes", secs as f64 / 60.0)
    } else {
        format!("{} seconds", secs)
    }
}
