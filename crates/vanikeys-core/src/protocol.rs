//! The two entry points shared by searcher and owner.
//!
//! Searcher: [`submit`] takes the owner's commitment bytes and a pattern and
//! runs a search. Owner: [`verify_and_derive`] checks a returned proof
//! against the seed and only then produces the private key.

use crate::derivation::{derive_private, Parent};
use crate::encoding::fingerprint_key;
use crate::matcher::{MatchResult, PatternSpec};
use crate::proof::Proof;
use crate::search::{SearchConfig, SearchMode, SearchOutcome, SearchProgress, Searcher};
use crate::types::{Commitment, PathIndex, PrivateKey, Seed, VaniError};

/// Run a search for `pattern` under `commitment` from index 0.
///
/// Single-pull returns after one derivation; guaranteed mode may run for a
/// long time and should be called off any latency-sensitive thread.
///
/// # Arguments
/// * `commitment` - The owner's 33-byte compressed commitment
/// * `pattern` - Substrings to find, with fuzzy and case options
/// * `mode` - `SinglePull` for one index, `Guaranteed` to search the budget
/// * `budget` - Indices to try in guaranteed mode (ignored for single-pull)
///
/// # Returns
/// `Found` with a key and proof, `Incomplete` when the budget ran out, or
/// `Cancelled`
///
/// # Errors
/// `EmptyPattern` or `InvalidPattern` for a bad pattern, `InvalidParent`
/// for bytes that are not a curve point, `IndexOutOfRange` when the budget
/// runs past the last index
pub fn submit(
    commitment: &[u8],
    pattern: &PatternSpec,
    mode: SearchMode,
    budget: u64,
) -> Result<SearchOutcome, VaniError> {
    let searcher = Searcher::new(SearchConfig::default())?;
    submit_with(&searcher, commitment, pattern, mode, 0, budget, |_| {})
}

/// [`submit`] on a caller-owned `Searcher`, so it can be cancelled and
/// observed, with a start index and a progress callback.
pub fn submit_with<P>(
    searcher: &Searcher,
    commitment: &[u8],
    pattern: &PatternSpec,
    mode: SearchMode,
    start: PathIndex,
    budget: u64,
    progress: P,
) -> Result<SearchOutcome, VaniError>
where
    P: Fn(SearchProgress) + Sync,
{
    if pattern.substrings.is_empty() {
        return Err(VaniError::EmptyPattern);
    }
    let commitment = Commitment::from_bytes(commitment)?;
    let compiled = pattern.compile()?;
    searcher.search_with_progress(&commitment, &compiled, mode, start, budget, progress)
}

/// Owner side: verify `proof` against `seed`, then derive the private key.
///
/// No key is derived unless every proof check passes.
///
/// # Arguments
/// * `proof` - Proof returned by the searcher
/// * `seed` - The owner's 32-byte seed
///
/// # Returns
/// The private key whose public half is `proof.child_public`
///
/// # Errors
/// `UnsupportedVersion` for an unknown proof version, `VerificationFailed`
/// when the commitment, child key, or binding hash does not match the seed
pub fn verify_and_derive(proof: &Proof, seed: &Seed) -> Result<PrivateKey, VaniError> {
    if let Err(e) = proof.verify(Parent::Seed(seed)) {
        log::warn!("Rejected proof for index {}: {}", proof.path_index, e);
        return Err(e);
    }

    let derived = derive_private(seed, proof.path_index)?;
    let private_key = derived
        .private_key
        .ok_or_else(|| VaniError::VerificationFailed("no private key derived".into()))?;
    if private_key.public_key() != proof.child_public {
        return Err(VaniError::VerificationFailed(
            "derived key does not match the proof".into(),
        ));
    }

    log::info!("Proof verified for index {}", proof.path_index);
    Ok(private_key)
}

/// Owner side: verify `proof`, then re-run the matcher on the fingerprint
/// the owner derived, instead of trusting the searcher's reported match.
pub fn verify_and_match(
    proof: &Proof,
    seed: &Seed,
    pattern: &PatternSpec,
) -> Result<MatchResult, VaniError> {
    proof.verify(Parent::Seed(seed))?;
    let compiled = pattern.compile()?;
    let fp = fingerprint_key(&proof.child_public);
    Ok(compiled.match_text(fp.body()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::commitment_from_seed;

    #[test]
    fn test_submit_rejects_empty_pattern() {
        let seed = Seed::from([1u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let pattern = PatternSpec::new(Vec::<String>::new());
        assert_eq!(
            submit(&c, &pattern, SearchMode::Guaranteed, 100).unwrap_err(),
            VaniError::EmptyPattern
        );
    }

    #[test]
    fn test_submit_rejects_bad_commitment() {
        let pattern = PatternSpec::new(["AB"]);
        assert!(matches!(
            submit(&[0u8; 33], &pattern, SearchMode::SinglePull, 1),
            Err(VaniError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_submit_rejects_invalid_pattern() {
        let seed = Seed::from([1u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let pattern = PatternSpec::new(["no spaces"]);
        assert!(matches!(
            submit(&c, &pattern, SearchMode::SinglePull, 1),
            Err(VaniError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_single_pull_then_derive() {
        let seed = Seed::from([2u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let pattern = PatternSpec::new(["QQQQQQ"]);

        let outcome = submit(&c, &pattern, SearchMode::SinglePull, 0).unwrap();
        let result = outcome.found().unwrap();
        assert_eq!(result.path_index, 0);

        let sk = verify_and_derive(&result.proof, &seed).unwrap();
        assert_eq!(sk.public_key(), result.public_key);
    }

    #[test]
    fn test_verify_and_derive_wrong_seed() {
        let seed = Seed::from([3u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let outcome = submit(&c, &PatternSpec::new(["A"]), SearchMode::SinglePull, 0).unwrap();
        let proof = &outcome.found().unwrap().proof;

        let other = Seed::from([4u8; 32]);
        assert!(matches!(
            verify_and_derive(proof, &other),
            Err(VaniError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_verify_and_match_recomputes() {
        let seed = Seed::from([5u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let pattern = PatternSpec::new(["ab"]);
        let searcher = Searcher::new(SearchConfig {
            workers: 2,
            checkpoint_interval: 32,
            progress_interval: 1000,
        })
        .unwrap();

        let outcome = submit_with(&searcher, &c, &pattern, SearchMode::Guaranteed, 0, 5000, |_| {})
            .unwrap();
        let result = outcome.found().unwrap();

        let rematched = verify_and_match(&result.proof, &seed, &pattern).unwrap();
        assert_eq!(rematched, result.match_result);
        assert!(rematched.is_exact());
    }

    #[test]
    fn test_submit_with_cancelled_searcher() {
        let seed = Seed::from([6u8; 32]);
        let c = commitment_from_seed(&seed).unwrap().to_bytes();
        let pattern = PatternSpec::new(["ZZZZZZZZZZ"]).case_sensitive(true);
        let searcher = Searcher::new(SearchConfig {
            workers: 1,
            checkpoint_interval: 32,
            progress_interval: 1000,
        })
        .unwrap();
        searcher.cancel_token().cancel();

        let outcome = submit_with(
            &searcher,
            &c,
            &pattern,
            SearchMode::Guaranteed,
            0,
            1_000_000,
            |_| {},
        )
        .unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled { attempts: 32 }));
    }
}
