//! Parallel search over a window of path indices.
//!
//! The window `[start, start + budget)` is split into contiguous chunks, one
//! per worker thread. Every worker scans its chunk in increasing order and
//! owns its own copies of the parent key, the pattern, and a secp256k1
//! context. The only shared state is a handful of atomics:
//!
//! - `best`: the lowest qualifying index reported so far (`fetch_min`),
//! - `attempts`: the number of indices evaluated, flushed at checkpoints,
//! - the caller's [`CancelToken`].
//!
//! # Tie-break
//!
//! The reported result is always the lowest qualifying index in the window.
//! A worker only gives up on its chunk once its next index is above `best`,
//! so any lower qualifying index is still reached by the worker that owns
//! it. Reruns with the same parent, pattern, and window therefore report the
//! same index no matter which worker finished first.
//!
//! Cancellation is cooperative and checked every `checkpoint_interval`
//! attempts per worker.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use secp256k1::{PublicKey, Secp256k1, VerifyOnly};
use serde::{Deserialize, Serialize};

use crate::derivation::{check_window, derive_public, derive_public_with};
use crate::encoding::{fingerprint_key, Fingerprint};
use crate::matcher::{MatchResult, Pattern};
use crate::proof::Proof;
use crate::types::{Commitment, PathIndex, VaniError};

/// Stop condition of a search.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Evaluate exactly one index and return it whatever its score.
    SinglePull,
    /// Keep going until an exact match or the budget runs out.
    Guaranteed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Worker threads.
    pub workers: usize,
    /// Attempts per worker between cancellation checks and counter flushes.
    pub checkpoint_interval: u64,
    /// Attempts between progress notifications. Every multiple of this
    /// interval is reported once, even when it is smaller than
    /// `checkpoint_interval`; such reports are delivered at the next flush.
    pub progress_interval: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            checkpoint_interval: 4096,
            progress_interval: 100_000,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), VaniError> {
        if self.workers == 0 {
            return Err(VaniError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(VaniError::InvalidConfig(
                "checkpoint_interval must be at least 1".into(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(VaniError::InvalidConfig(
                "progress_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    Idle = 0,
    Searching = 1,
    Found = 2,
    Exhausted = 3,
    Cancelled = 4,
}

impl SearchState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SearchState::Searching,
            2 => SearchState::Found,
            3 => SearchState::Exhausted,
            4 => SearchState::Cancelled,
            _ => SearchState::Idle,
        }
    }
}

/// Cooperative cancellation handle. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchProgress {
    pub attempts: u64,
    pub budget: u64,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub path_index: PathIndex,
    pub public_key: PublicKey,
    pub fingerprint: Fingerprint,
    pub match_result: MatchResult,
    pub attempts: u64,
    pub proof: Proof,
}

/// Terminal state of a search. Only `Found` carries a key.
#[derive(Clone, Debug)]
pub enum SearchOutcome {
    Found(SearchResult),
    /// Budget exhausted without a qualifying index. Not an error.
    Incomplete { attempts: u64 },
    Cancelled { attempts: u64 },
}

impl SearchOutcome {
    pub fn attempts(&self) -> u64 {
        match self {
            SearchOutcome::Found(r) => r.attempts,
            SearchOutcome::Incomplete { attempts } | SearchOutcome::Cancelled { attempts } => {
                *attempts
            }
        }
    }

    pub fn found(&self) -> Option<&SearchResult> {
        match self {
            SearchOutcome::Found(r) => Some(r),
            _ => None,
        }
    }
}

/// Result of scanning a window with an arbitrary evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Hit { index: PathIndex, attempts: u64 },
    Exhausted { attempts: u64 },
    Cancelled { attempts: u64 },
}

/// Per-index qualification test run by each worker.
///
/// Every worker gets its own clone, so implementations may keep scratch
/// state behind `&mut self`.
pub trait Evaluate: Clone + Send {
    fn qualifies(&mut self, index: PathIndex) -> Result<bool, VaniError>;
}

/// Production evaluator: derive, fingerprint, require an exact match.
#[derive(Clone)]
pub struct FingerprintEvaluator {
    secp: Secp256k1<VerifyOnly>,
    parent: PublicKey,
    pattern: Pattern,
}

impl FingerprintEvaluator {
    pub fn new(commitment: &Commitment, pattern: &Pattern) -> Self {
        FingerprintEvaluator {
            secp: Secp256k1::verification_only(),
            parent: *commitment.public_key(),
            pattern: pattern.clone(),
        }
    }
}

impl Evaluate for FingerprintEvaluator {
    fn qualifies(&mut self, index: PathIndex) -> Result<bool, VaniError> {
        let child = derive_public_with(&self.secp, &self.parent, index)?;
        let fp = fingerprint_key(&child);
        Ok(self.pattern.is_exact_match(fp.body()))
    }
}

pub struct Searcher {
    config: SearchConfig,
    state: AtomicU8,
    cancel: CancelToken,
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Result<Self, VaniError> {
        config.validate()?;
        Ok(Searcher {
            config,
            state: AtomicU8::new(SearchState::Idle as u8),
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Handle for cancelling searches run by this searcher.
    ///
    /// Cancellation is sticky: once cancelled, later searches on this
    /// `Searcher` stop at their first checkpoint.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn set_state(&self, state: SearchState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn search(
        &self,
        commitment: &Commitment,
        pattern: &Pattern,
        mode: SearchMode,
        start: PathIndex,
        budget: u64,
    ) -> Result<SearchOutcome, VaniError> {
        self.search_with_progress(commitment, pattern, mode, start, budget, |_| {})
    }

    /// Search `[start, start + budget)` for an exact match of `pattern`.
    ///
    /// `progress` is called from worker threads once per multiple of
    /// `progress_interval` attempts, and may cancel through a cloned
    /// [`CancelToken`].
    ///
    /// # Errors
    /// `EmptyPattern` for a pattern with no substrings, `IndexOutOfRange`
    /// for a window past the end of the path space
    pub fn search_with_progress<P>(
        &self,
        commitment: &Commitment,
        pattern: &Pattern,
        mode: SearchMode,
        start: PathIndex,
        budget: u64,
        progress: P,
    ) -> Result<SearchOutcome, VaniError>
    where
        P: Fn(SearchProgress) + Sync,
    {
        if pattern.is_empty() {
            return Err(VaniError::EmptyPattern);
        }

        if mode == SearchMode::SinglePull {
            self.set_state(SearchState::Searching);
            log::debug!("Single pull at index {}", start);
            let result = build_result(commitment, pattern, start, 1)?;
            self.set_state(SearchState::Found);
            return Ok(SearchOutcome::Found(result));
        }

        check_window(start, budget)?;
        if budget == 0 {
            self.set_state(SearchState::Exhausted);
            return Ok(SearchOutcome::Incomplete { attempts: 0 });
        }

        log::info!(
            "Searching {} indices from {} with {} workers for '{}'",
            budget,
            start,
            self.config.workers.min(budget as usize).max(1),
            pattern.spec().display()
        );

        let evaluator = FingerprintEvaluator::new(commitment, pattern);
        match self.scan(&evaluator, start, budget, &progress)? {
            ScanOutcome::Hit { index, attempts } => {
                let result = build_result(commitment, pattern, index, attempts)?;
                log::info!(
                    "Found {} at index {} after {} attempts",
                    result.fingerprint,
                    index,
                    attempts
                );
                Ok(SearchOutcome::Found(result))
            }
            ScanOutcome::Exhausted { attempts } => {
                log::info!("Budget exhausted after {} attempts", attempts);
                Ok(SearchOutcome::Incomplete { attempts })
            }
            ScanOutcome::Cancelled { attempts } => {
                log::info!("Search cancelled after {} attempts", attempts);
                Ok(SearchOutcome::Cancelled { attempts })
            }
        }
    }

    /// Scan `[start, start + budget)` with `evaluator` and return the lowest
    /// qualifying index, if any.
    ///
    /// A scan that observed cancellation reports `Cancelled` even when some
    /// worker already had a hit: a lower index may not have been reached.
    pub fn scan<E, P>(
        &self,
        evaluator: &E,
        start: PathIndex,
        budget: u64,
        progress: &P,
    ) -> Result<ScanOutcome, VaniError>
    where
        E: Evaluate,
        P: Fn(SearchProgress) + Sync,
    {
        check_window(start, budget)?;
        self.set_state(SearchState::Searching);

        if budget == 0 {
            self.set_state(SearchState::Exhausted);
            return Ok(ScanOutcome::Exhausted { attempts: 0 });
        }

        let workers = (self.config.workers as u64).clamp(1, budget);
        let chunk = budget.div_ceil(workers);

        let shared = Shared {
            best: AtomicU64::new(u64::MAX),
            attempts: AtomicU64::new(0),
            interrupted: AtomicBool::new(false),
            failure: OnceLock::new(),
            budget,
            checkpoint: self.config.checkpoint_interval,
            progress_interval: self.config.progress_interval,
            cancel: &self.cancel,
        };

        std::thread::scope(|s| {
            for w in 0..workers {
                let lo = w * chunk;
                let hi = budget.min(lo + chunk);
                if lo >= hi {
                    continue;
                }
                let shared = &shared;
                let mut evaluator = evaluator.clone();
                let (lo, hi) = (u64::from(start) + lo, u64::from(start) + hi);
                s.spawn(move || {
                    shared.run_worker(&mut evaluator, lo, hi, progress);
                    log::debug!("Worker {} done with [{}, {})", w, lo, hi);
                });
            }
        });

        if let Some(err) = shared.failure.into_inner() {
            self.set_state(SearchState::Idle);
            return Err(err);
        }

        let attempts = shared.attempts.load(Ordering::Acquire);
        let best = shared.best.load(Ordering::Acquire);

        let outcome = if shared.interrupted.load(Ordering::Acquire) {
            self.set_state(SearchState::Cancelled);
            ScanOutcome::Cancelled { attempts }
        } else if best != u64::MAX {
            self.set_state(SearchState::Found);
            ScanOutcome::Hit {
                index: best as PathIndex,
                attempts,
            }
        } else {
            self.set_state(SearchState::Exhausted);
            ScanOutcome::Exhausted { attempts }
        };
        Ok(outcome)
    }
}

struct Shared<'a> {
    best: AtomicU64,
    attempts: AtomicU64,
    interrupted: AtomicBool,
    failure: OnceLock<VaniError>,
    budget: u64,
    checkpoint: u64,
    progress_interval: u64,
    cancel: &'a CancelToken,
}

impl Shared<'_> {
    /// Scan absolute indices `[lo, hi)`.
    fn run_worker<E, P>(&self, evaluator: &mut E, lo: u64, hi: u64, progress: &P)
    where
        E: Evaluate,
        P: Fn(SearchProgress) + Sync,
    {
        let mut pending = 0u64;

        for index in lo..hi {
            if index > self.best.load(Ordering::Acquire) {
                break;
            }

            pending += 1;
            match evaluator.qualifies(index as PathIndex) {
                Ok(true) => {
                    self.best.fetch_min(index, Ordering::AcqRel);
                    break;
                }
                Ok(false) => {}
                Err(VaniError::TweakOutOfRange) => {
                    log::warn!("Skipping index {}: tweak out of range", index);
                }
                Err(e) => {
                    let _ = self.failure.set(e);
                    self.interrupted.store(true, Ordering::Release);
                    break;
                }
            }

            if pending == self.checkpoint {
                self.flush(pending, progress);
                pending = 0;
                if self.cancel.is_cancelled() || self.interrupted.load(Ordering::Acquire) {
                    self.interrupted.store(true, Ordering::Release);
                    break;
                }
            }
        }

        self.flush(pending, progress);
    }

    /// Add `n` attempts to the shared counter and report every progress
    /// boundary the addition crossed, in order, at its exact attempt count.
    fn flush<P: Fn(SearchProgress) + Sync>(&self, n: u64, progress: &P) {
        if n == 0 {
            return;
        }
        let before = self.attempts.fetch_add(n, Ordering::AcqRel);
        let after = before + n;
        let interval = self.progress_interval;
        for k in (before / interval + 1)..=(after / interval) {
            progress(SearchProgress {
                attempts: k * interval,
                budget: self.budget,
            });
        }
    }
}

/// Assemble the full result for a qualifying index.
fn build_result(
    commitment: &Commitment,
    pattern: &Pattern,
    index: PathIndex,
    attempts: u64,
) -> Result<SearchResult, VaniError> {
    let public_key = derive_public(commitment, index)?;
    let fingerprint = fingerprint_key(&public_key);
    let match_result = pattern.match_text(fingerprint.body());
    Ok(SearchResult {
        path_index: index,
        public_key,
        fingerprint,
        match_result,
        attempts,
        proof: Proof::generate(commitment, index, public_key),
    })
}
