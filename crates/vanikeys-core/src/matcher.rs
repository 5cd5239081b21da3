//! Multi-substring fingerprint matching with optional fuzzy substitution.
//!
//! Substrings are matched strictly left to right and never overlap: each hit
//! moves the cursor past itself, each miss leaves the cursor where it was.
//! With fuzzy matching on, visually ambiguous characters match their whole
//! group, e.g. `COOL` also matches `C00L` and `CO0L`.

use std::fmt::Write as _;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::encoding::FINGERPRINT_BODY_LEN;
use crate::types::VaniError;

/// Fuzzy substitution table, version 1. Part of `DOMAIN_TAG`; never edit in place.
pub const FUZZY_GROUPS_V1: &[&[char]] = &[
    &['0', 'O'],
    &['1', 'I', 'L'],
    &['3', 'E'],
    &['5', 'S'],
    &['8', 'B'],
];

/// Bonus runs must be at least this long.
pub const MIN_BONUS_RUN: usize = 3;

/// At most this many bonus matches are reported.
pub const MAX_BONUS_MATCHES: usize = 3;

/// Combined pattern length above which a pattern is flagged as slow to find.
const LONG_PATTERN_WARNING: usize = 8;

/// The fuzzy group `c` belongs to, if any.
///
/// Case-sensitive lookups only consider the exact character; otherwise the
/// uppercase form is tried too.
pub fn fuzzy_group(c: char, case_sensitive: bool) -> Option<&'static [char]> {
    let lookup = |ch: char| FUZZY_GROUPS_V1.iter().copied().find(|g| g.contains(&ch));
    match lookup(c) {
        Some(group) => Some(group),
        None if !case_sensitive => lookup(c.to_ascii_uppercase()),
        None => None,
    }
}

fn is_fingerprint_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/'
}

/// Wire form of a pattern: what callers hand to `submit`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PatternSpec {
    pub substrings: Vec<String>,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl PatternSpec {
    pub fn new<S: Into<String>>(substrings: impl IntoIterator<Item = S>) -> Self {
        PatternSpec {
            substrings: substrings.into_iter().map(Into::into).collect(),
            fuzzy: false,
            case_sensitive: false,
        }
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, VaniError> {
        serde_json::from_str(json).map_err(|e| VaniError::Serialization(e.to_string()))
    }

    /// Total characters across all substrings.
    pub fn total_len(&self) -> usize {
        self.substrings.iter().map(|s| s.chars().count()).sum()
    }

    /// Space-joined display form, e.g. `GO BE AWE SOME`.
    pub fn display(&self) -> String {
        self.substrings.join(" ")
    }

    /// Validate and build the matcher.
    ///
    /// An empty substring list compiles (and scores 1.0); the search engine
    /// is responsible for refusing it.
    pub fn compile(&self) -> Result<Pattern, VaniError> {
        let mut targets = Vec::with_capacity(self.substrings.len());

        for sub in &self.substrings {
            if sub.is_empty() {
                return Err(VaniError::InvalidPattern("empty substring".into()));
            }
            if let Some(bad) = sub.chars().find(|c| !is_fingerprint_char(*c)) {
                return Err(VaniError::InvalidPattern(format!(
                    "'{}' contains {:?}, which never appears in a fingerprint",
                    sub, bad
                )));
            }
            if sub.len() > FINGERPRINT_BODY_LEN {
                return Err(VaniError::InvalidPattern(format!(
                    "'{}' is longer than a fingerprint ({} chars max)",
                    sub, FINGERPRINT_BODY_LEN
                )));
            }

            let regex = Regex::new(&self.target_regex(sub))
                .map_err(|e| VaniError::InvalidPattern(e.to_string()))?;
            targets.push(Target {
                text: sub.clone(),
                regex,
            });
        }

        if self.total_len() >= LONG_PATTERN_WARNING {
            log::warn!(
                "Pattern '{}' is {} characters long and may take a very long time to find",
                self.display(),
                self.total_len()
            );
        }

        Ok(Pattern {
            spec: self.clone(),
            targets,
        })
    }

    fn target_regex(&self, sub: &str) -> String {
        let mut re = String::with_capacity(sub.len() * 4 + 4);
        if !self.case_sensitive {
            re.push_str("(?i)");
        }
        for c in sub.chars() {
            match fuzzy_group(c, self.case_sensitive).filter(|_| self.fuzzy) {
                Some(group) => {
                    re.push('[');
                    re.push(c);
                    for member in group.iter().filter(|m| **m != c) {
                        re.push(*member);
                    }
                    re.push(']');
                }
                None => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
            }
        }
        re
    }
}

#[derive(Clone, Debug)]
struct Target {
    text: String,
    regex: Regex,
}

/// A compiled, immutable pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    spec: PatternSpec,
    targets: Vec<Target>,
}

/// One requested substring found in the text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubstringMatch {
    pub substring: String,
    /// Byte offset in the matched text.
    pub position: usize,
    /// What actually matched (differs from `substring` under fuzzy/case folding).
    pub matched_text: String,
}

/// An incidental run found in the text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BonusMatch {
    pub text: String,
    pub position: usize,
}

/// Rarity tier of a match, for display.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// matched / requested, in [0, 1].
    pub score: f64,
    pub matched: Vec<SubstringMatch>,
    pub missing: Vec<String>,
    /// Never contributes to `score`.
    pub bonus: Vec<BonusMatch>,
}

impl Pattern {
    pub fn spec(&self) -> &PatternSpec {
        &self.spec
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when every substring matches, in order.
    ///
    /// Same walk as [`Pattern::match_text`] but stops at the first miss and
    /// allocates nothing; the search loop uses it before building a result.
    pub fn is_exact_match(&self, text: &str) -> bool {
        let mut cursor = 0;
        for target in &self.targets {
            match target.regex.find_at(text, cursor) {
                Some(m) => cursor = m.end(),
                None => return false,
            }
        }
        true
    }

    /// Evaluate `text` against the pattern.
    pub fn match_text(&self, text: &str) -> MatchResult {
        let mut matched = Vec::new();
        let mut missing = Vec::new();
        let mut cursor = 0;

        for target in &self.targets {
            match target.regex.find_at(text, cursor) {
                Some(m) => {
                    matched.push(SubstringMatch {
                        substring: target.text.clone(),
                        position: m.start(),
                        matched_text: m.as_str().to_string(),
                    });
                    cursor = m.end();
                }
                None => missing.push(target.text.clone()),
            }
        }

        let score = if self.targets.is_empty() {
            1.0
        } else {
            matched.len() as f64 / self.targets.len() as f64
        };

        MatchResult {
            score,
            matched,
            missing,
            bonus: self.find_bonus(text),
        }
    }

    fn same_text(&self, a: &str, b: &str) -> bool {
        if self.spec.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Runs of at least `MIN_BONUS_RUN` identical alphanumeric characters.
    fn find_bonus(&self, text: &str) -> Vec<BonusMatch> {
        let bytes = text.as_bytes();
        let mut bonus = Vec::new();
        let mut start = 0;

        while start < bytes.len() && bonus.len() < MAX_BONUS_MATCHES {
            let first = bytes[start];
            let mut end = start + 1;
            while end < bytes.len() && self.same_byte(bytes[end], first) {
                end += 1;
            }

            if first.is_ascii_alphanumeric() && end - start >= MIN_BONUS_RUN {
                let run = &text[start..end];
                let requested = self.targets.iter().any(|t| self.same_text(&t.text, run));
                if !requested {
                    bonus.push(BonusMatch {
                        text: run.to_string(),
                        position: start,
                    });
                }
            }
            start = end;
        }

        bonus
    }

    fn same_byte(&self, a: u8, b: u8) -> bool {
        if self.spec.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(&b)
        }
    }
}

impl MatchResult {
    pub fn is_exact(&self) -> bool {
        self.missing.is_empty()
    }

    /// Characters of the pattern that were actually matched.
    pub fn matched_len(&self) -> usize {
        self.matched.iter().map(|m| m.substring.len()).sum()
    }

    pub fn rarity(&self) -> Rarity {
        match self.matched_len() {
            0..=3 => Rarity::Common,
            4..=5 => Rarity::Uncommon,
            6..=7 => Rarity::Rare,
            8..=10 => Rarity::Epic,
            _ => Rarity::Legendary,
        }
    }

    /// Human-readable report of the match against `text`.
    pub fn explain(&self, text: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Score: {:.0}% ({:?})", self.score * 100.0, self.rarity());
        let _ = writeln!(out, "In text: {}", text);
        for m in &self.matched {
            let _ = writeln!(
                out,
                "  {:15} -> position {:3}-{:3}: {}",
                m.substring,
                m.position,
                m.position + m.matched_text.len(),
                m.matched_text
            );
        }
        for sub in &self.missing {
            let _ = writeln!(out, "  {:15} -> missing", sub);
        }
        for b in &self.bonus {
            let _ = writeln!(out, "  bonus '{}' at {}", b.text, b.position);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(subs: &[&str]) -> Pattern {
        PatternSpec::new(subs.iter().copied())
            .case_sensitive(true)
            .compile()
            .unwrap()
    }

    #[test]
    fn test_in_order_full_match() {
        let result = exact(&["AB", "CD"]).match_text("xxABxxCDxx");
        assert_eq!(result.score, 1.0);
        assert!(result.is_exact());
        assert_eq!(result.matched[0].position, 2);
        assert_eq!(result.matched[1].position, 6);
    }

    #[test]
    fn test_out_of_order_is_partial() {
        let result = exact(&["AB", "CD"]).match_text("xxCDxxABxx");
        assert!(result.score < 1.0);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].substring, "AB");
        assert_eq!(result.matched[0].position, 6);
        assert_eq!(result.missing, vec!["CD".to_string()]);
    }

    #[test]
    fn test_miss_does_not_advance_cursor() {
        // "ZZ" misses; "CD" is still searched from after "AB".
        let result = exact(&["AB", "ZZ", "CD"]).match_text("ABxCD");
        assert_eq!(result.matched.len(), 2);
        assert_eq!(result.missing, vec!["ZZ".to_string()]);
        assert_eq!(result.matched[1].position, 3);
    }

    #[test]
    fn test_matches_do_not_overlap() {
        let result = exact(&["ABA", "ABA"]).match_text("ABABA");
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.missing.len(), 1);

        let result = exact(&["ABA", "ABA"]).match_text("ABAABA");
        assert!(result.is_exact());
        assert_eq!(result.matched[1].position, 3);
    }

    #[test]
    fn test_fuzzy_equivalence() {
        let pattern = PatternSpec::new(["COOL"])
            .fuzzy(true)
            .case_sensitive(true)
            .compile()
            .unwrap();
        for text in ["xxC00Lxx", "xxCO0Lxx", "xxCOOLxx"] {
            assert_eq!(pattern.match_text(text).score, 1.0, "{}", text);
        }
        // L is in the {1, I, L} group.
        assert_eq!(pattern.match_text("COO1").score, 1.0);
        assert_eq!(pattern.match_text("CQQL").score, 0.0);
    }

    #[test]
    fn test_fuzzy_digit_pattern_matches_letters() {
        let pattern = PatternSpec::new(["B00M"])
            .fuzzy(true)
            .case_sensitive(true)
            .compile()
            .unwrap();
        assert!(pattern.is_exact_match("xBOOMx"));
        assert!(pattern.is_exact_match("x8OOMx"));
        assert!(!pattern.is_exact_match("xbOOMx"));
    }

    #[test]
    fn test_no_fuzzy_without_flag() {
        let pattern = exact(&["COOL"]);
        assert_eq!(pattern.match_text("C00L").score, 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        let pattern = PatternSpec::new(["AbC"]).compile().unwrap();
        assert!(pattern.is_exact_match("xxabcxx"));
        assert!(pattern.is_exact_match("xxABCxx"));

        let sensitive = exact(&["AbC"]);
        assert!(!sensitive.is_exact_match("xxabcxx"));
    }

    #[test]
    fn test_fuzzy_case_insensitive_lowercase() {
        let pattern = PatternSpec::new(["cool"]).fuzzy(true).compile().unwrap();
        assert!(pattern.is_exact_match("C00L"));
        assert!(pattern.is_exact_match("co0l"));
    }

    #[test]
    fn test_empty_pattern_is_vacuous() {
        let pattern = PatternSpec::new(Vec::<String>::new()).compile().unwrap();
        assert!(pattern.is_empty());
        let result = pattern.match_text("anything");
        assert_eq!(result.score, 1.0);
        assert!(result.is_exact());
    }

    #[test]
    fn test_invalid_substrings_rejected() {
        assert!(matches!(
            PatternSpec::new([""]).compile(),
            Err(VaniError::InvalidPattern(_))
        ));
        assert!(PatternSpec::new(["dev-key"]).compile().is_err());
        assert!(PatternSpec::new(["A".repeat(44)]).compile().is_err());
        assert!(PatternSpec::new(["A".repeat(43)]).compile().is_ok());
        assert!(PatternSpec::new(["a+b/c"]).compile().is_ok());
    }

    #[test]
    fn test_regex_metachar_is_literal() {
        let pattern = exact(&["a+b"]);
        assert!(pattern.is_exact_match("xa+bx"));
        assert!(!pattern.is_exact_match("xaabx"));
    }

    #[test]
    fn test_exact_fast_path_agrees() {
        let pattern = exact(&["AB", "CD"]);
        for text in ["xxABxxCDxx", "xxCDxxABxx", "ABCD", "AB", ""] {
            assert_eq!(
                pattern.is_exact_match(text),
                pattern.match_text(text).is_exact(),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_bonus_runs() {
        let pattern = exact(&["AB"]);
        let result = pattern.match_text("ABxxx7777+++");
        assert_eq!(
            result.bonus,
            vec![
                BonusMatch {
                    text: "xxx".into(),
                    position: 2
                },
                BonusMatch {
                    text: "7777".into(),
                    position: 5
                },
            ]
        );
        // Bonus never moves the score.
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_bonus_excludes_requested_and_caps() {
        let pattern = exact(&["QQQ"]);
        let result = pattern.match_text("QQQaaabbbcccddd");
        assert!(result.bonus.iter().all(|b| b.text != "QQQ"));
        assert_eq!(result.bonus.len(), MAX_BONUS_MATCHES);
    }

    #[test]
    fn test_bonus_does_not_affect_missing_score() {
        let pattern = exact(&["ZZ"]);
        let result = pattern.match_text("aaaa");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.bonus.len(), 1);
    }

    #[test]
    fn test_rarity_tiers() {
        let pattern = exact(&["ABC"]);
        assert_eq!(pattern.match_text("ABC").rarity(), Rarity::Common);
        let pattern = exact(&["ABCDE", "FG"]);
        assert_eq!(pattern.match_text("ABCDEFG").rarity(), Rarity::Rare);
        let pattern = exact(&["ABCDEFGHIJK"]);
        assert_eq!(pattern.match_text("ABCDEFGHIJK").rarity(), Rarity::Legendary);
    }

    #[test]
    fn test_explain_mentions_missing() {
        let pattern = exact(&["AB", "CD"]);
        let text = "xxCDxxABxx";
        let report = pattern.match_text(text).explain(text);
        assert!(report.contains("Score: 50%"));
        assert!(report.contains("CD"));
        assert!(report.contains("missing"));
    }

    #[test]
    fn test_spec_json_defaults() {
        let spec = PatternSpec::from_json(r#"{"substrings":["GO","BE"]}"#).unwrap();
        assert_eq!(spec.substrings, vec!["GO", "BE"]);
        assert!(!spec.fuzzy);
        assert!(!spec.case_sensitive);
        assert_eq!(spec.display(), "GO BE");
        assert!(PatternSpec::from_json("{").is_err());
    }

    #[test]
    fn test_fuzzy_group_lookup() {
        assert_eq!(fuzzy_group('0', true), Some(&['0', 'O'][..]));
        assert_eq!(fuzzy_group('l', false), Some(&['1', 'I', 'L'][..]));
        assert_eq!(fuzzy_group('l', true), None);
        assert_eq!(fuzzy_group('Z', false), None);
    }
}
