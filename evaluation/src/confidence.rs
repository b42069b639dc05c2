//! Overconfidence penalty for free-text model answers.
//!
//! Counts confident-language terms, normalises by answer length and lets
//! hedging language cancel up to half of the result:
//!
//! ```text
//! penalty = (confident_terms × 0.15) / ln(1 + word_count)
//!         × (1 − min(hedge_terms × 0.1, 0.5))
//! ```
//!
//! A term counts once no matter how often it occurs. Matching is
//! case-insensitive and whole-word; multi-word terms ("without doubt")
//! tolerate any run of whitespace between their words.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScoringResult;
use crate::round_score;

/// Penalty contributed by each confident term before length normalisation.
pub const CONFIDENT_TERM_PENALTY: f64 = 0.15;
/// Reduction per hedging term.
pub const HEDGE_TERM_RELIEF: f64 = 0.1;
/// Hedging can cancel at most this fraction of the penalty.
pub const MAX_HEDGE_RELIEF: f64 = 0.5;

const STANDARD_CONFIDENT: &[&str] = &[
    "definitely",
    "certainly",
    "always",
    "never",
    "guaranteed",
    "undoubtedly",
    "clearly",
    "without doubt",
];

const STANDARD_HEDGING: &[&str] = &[
    "maybe", "perhaps", "possibly", "might", "could", "i think", "i guess", "likely", "seems",
    "suggests",
];

/// The two term lists that drive the overconfidence penalty.
///
/// Immutable once built; share it by reference or `Arc` across scorers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    confident: Vec<String>,
    hedging: Vec<String>,
}

impl Lexicon {
    pub fn new<C, H>(confident: C, hedging: H) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            confident: confident.into_iter().map(Into::into).collect(),
            hedging: hedging.into_iter().map(Into::into).collect(),
        }
    }

    /// The built-in English lexicon.
    pub fn standard() -> Self {
        Self::new(
            STANDARD_CONFIDENT.iter().copied(),
            STANDARD_HEDGING.iter().copied(),
        )
    }

    pub fn confident(&self) -> &[String] {
        &self.confident
    }

    pub fn hedging(&self) -> &[String] {
        &self.hedging
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::standard()
    }
}

/// Raw signals behind a penalty, useful for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSignals {
    pub confident_terms: usize,
    pub hedge_terms: usize,
    pub word_count: usize,
    pub penalty: f64,
}

/// Scores linguistic overconfidence of a text in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct OverconfidenceScorer {
    confident: Vec<Regex>,
    hedging: Vec<Regex>,
}

impl OverconfidenceScorer {
    /// Compile a scorer for the given lexicon.
    pub fn new(lexicon: &Lexicon) -> ScoringResult<Self> {
        Ok(Self {
            confident: compile_terms(lexicon.confident())?,
            hedging: compile_terms(lexicon.hedging())?,
        })
    }

    /// Scorer over [`Lexicon::standard`].
    pub fn standard() -> ScoringResult<Self> {
        Self::new(&Lexicon::standard())
    }

    /// Overconfidence penalty in `[0, 1]`.
    pub fn penalty(&self, text: &str) -> f64 {
        self.signals(text).penalty
    }

    /// Confidence score: `1 − penalty`, rounded to two decimals.
    pub fn score(&self, text: &str) -> f64 {
        round_score(1.0 - self.penalty(text))
    }

    /// Full breakdown of the penalty computation.
    pub fn signals(&self, text: &str) -> ConfidenceSignals {
        let confident_terms = count_present(&self.confident, text);
        let hedge_terms = count_present(&self.hedging, text);
        // Zero-length text still counts as one word so the divisor is ln(2).
        let word_count = text.split_whitespace().count().max(1);

        let base = confident_terms as f64 * CONFIDENT_TERM_PENALTY / (word_count as f64).ln_1p();
        let hedge_factor = 1.0 - (hedge_terms as f64 * HEDGE_TERM_RELIEF).min(MAX_HEDGE_RELIEF);
        let penalty = (base * hedge_factor).clamp(0.0, 1.0);

        debug!(confident_terms, hedge_terms, word_count, penalty, "overconfidence signals");

        ConfidenceSignals {
            confident_terms,
            hedge_terms,
            word_count,
            penalty,
        }
    }
}

fn compile_terms(terms: &[String]) -> ScoringResult<Vec<Regex>> {
    terms
        .iter()
        .map(|term| {
            let body = term
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            Ok(Regex::new(&format!(r"(?i)\b{body}\b"))?)
        })
        .collect()
}

fn count_present(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|re| re.is_match(text)).count()
}
