//! Answer evaluation library
//!
//! Turns free-text model output into bounded quality scores:
//! - [`OverconfidenceScorer`]: linguistic overconfidence penalty, hedging-aware
//! - [`FactScorer`]: entity, date, citation, source and semantic checks against
//!   a [`KnowledgeBase`] topic
//!
//! Named-entity extraction and embeddings are capabilities ([`EntityExtractor`],
//! [`Embedder`]) so a real NER model or embedding server can be plugged in;
//! offline fallbacks ship in [`entities`] and [`embedding`].
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use evaluation::{FactScorer, HashingEmbedder, KnowledgeBase, PatternEntityExtractor};
//!
//! let scorer = FactScorer::new(
//!     Arc::new(KnowledgeBase::builtin()),
//!     Arc::new(PatternEntityExtractor::new()?),
//!     Arc::new(HashingEmbedder::default()),
//! )?;
//! let score = scorer.score("Thomas Edison invented the light bulb in 1879.", "light_bulb").await?;
//! ```

pub mod confidence;
pub mod embedding;
pub mod entities;
pub mod error;
pub mod fact;
pub mod knowledge;
pub mod similarity;

pub use confidence::{ConfidenceSignals, Lexicon, OverconfidenceScorer};
pub use embedding::{cosine_similarity, Embedder, HashingEmbedder, OllamaEmbedder};
pub use entities::{Entity, EntityExtractor, EntityLabel, PatternEntityExtractor};
pub use error::{EmbeddingError, ScoringError, ScoringResult};
pub use fact::{FactReport, FactScorer, PenaltyBreakdown};
pub use knowledge::{KnowledgeBase, KnowledgeFact};

/// Round a score to two decimals.
pub fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_score_two_decimals() {
        assert_eq!(round_score(0.784_3), 0.78);
        assert_eq!(round_score(0.785_1), 0.79);
        assert_eq!(round_score(1.0), 1.0);
        assert_eq!(round_score(0.0), 0.0);
    }
}
