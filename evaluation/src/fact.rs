//! Fact scoring against a knowledge-base topic.
//!
//! Five independent penalties are summed, then the score is clamped once:
//!
//! | Signal        | Rule                                                   | Penalty        |
//! |---------------|--------------------------------------------------------|----------------|
//! | entity        | no PERSON similar to the primary canonical entity      | 0.4            |
//! |               | some PERSON matches no canonical or alternate entity   | 0.3 (once)     |
//! | date          | DATEs present, none contains the canonical year        | 0.3            |
//! |               | no DATE at all                                         | 0.1            |
//! | specificity   | `published in <yyyy>`                                  | 0.3            |
//! |               | `titled "<...>"`                                       | 0.3            |
//! | source        | each URL outside the verified prefixes                 | 0.3 per URL    |
//! | semantic      | cosine(reference, answer) < 0.8                        | 1 − similarity |
//!
//! `score = round2(clamp(1 − Σ penalties, 0, 1))`. Penalties are never
//! clamped individually.

use std::sync::Arc;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::entities::{texts_with_label, EntityExtractor, EntityLabel};
use crate::error::ScoringResult;
use crate::knowledge::{KnowledgeBase, KnowledgeFact};
use crate::round_score;
use crate::similarity::{is_similar, ENTITY_SIMILARITY_THRESHOLD};

pub const MISSING_PRIMARY_ENTITY_PENALTY: f64 = 0.4;
pub const UNKNOWN_ENTITY_PENALTY: f64 = 0.3;
pub const WRONG_DATE_PENALTY: f64 = 0.3;
pub const MISSING_DATE_PENALTY: f64 = 0.1;
pub const FABRICATED_DETAIL_PENALTY: f64 = 0.3;
pub const UNVERIFIED_SOURCE_PENALTY: f64 = 0.3;
/// Below this cosine similarity the semantic penalty applies.
pub const SEMANTIC_SIMILARITY_FLOOR: f64 = 0.8;

/// Per-signal penalties for one answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PenaltyBreakdown {
    pub entity_penalty: f64,
    pub date_penalty: f64,
    pub specificity_penalty: f64,
    pub source_penalty: f64,
    pub semantic_penalty: f64,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f64 {
        self.entity_penalty
            + self.date_penalty
            + self.specificity_penalty
            + self.source_penalty
            + self.semantic_penalty
    }

    /// `round2(clamp(1 − total, 0, 1))`.
    pub fn score(&self) -> f64 {
        round_score((1.0 - self.total()).clamp(0.0, 1.0))
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0.0
    }
}

/// Result of scoring one answer against one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FactReport {
    pub topic_id: String,
    pub score: f64,
    pub breakdown: PenaltyBreakdown,
    /// Raw cosine similarity between the answer and the reference text.
    pub similarity: f64,
}

/// Entity penalty from the PERSON spans of an answer.
pub fn entity_penalty(people: &[&str], fact: &KnowledgeFact) -> f64 {
    let mut penalty = 0.0;

    if let Some(primary) = fact.primary_entity() {
        if !people
            .iter()
            .any(|p| is_similar(primary, p, ENTITY_SIMILARITY_THRESHOLD))
        {
            penalty += MISSING_PRIMARY_ENTITY_PENALTY;
        }
    }

    let is_known = |person: &str| {
        fact.canonical_entities
            .iter()
            .chain(fact.alternate_entities.iter())
            .any(|known| is_similar(known, person, ENTITY_SIMILARITY_THRESHOLD))
    };
    if let Some(stranger) = people.iter().copied().find(|&p| !is_known(p)) {
        debug!(person = %stranger, topic = %fact.topic_id, "unverified person mentioned");
        penalty += UNKNOWN_ENTITY_PENALTY;
    }

    penalty
}

/// Date penalty from the DATE spans of an answer.
pub fn date_penalty(dates: &[&str], fact: &KnowledgeFact) -> f64 {
    let Some(year) = fact.canonical_date else {
        return 0.0;
    };
    if dates.is_empty() {
        return MISSING_DATE_PENALTY;
    }
    let year = year.to_string();
    if dates.iter().any(|d| d.contains(&year)) {
        0.0
    } else {
        WRONG_DATE_PENALTY
    }
}

/// Semantic penalty for a cosine similarity.
pub fn semantic_penalty(similarity: f64) -> f64 {
    if similarity < SEMANTIC_SIMILARITY_FLOOR {
        1.0 - similarity
    } else {
        0.0
    }
}

/// Scores answers for factual and semantic fidelity to a topic.
pub struct FactScorer {
    knowledge: Arc<KnowledgeBase>,
    extractor: Arc<dyn EntityExtractor>,
    embedder: Arc<dyn Embedder>,
    published_in: Regex,
    titled: Regex,
    url: Regex,
}

impl FactScorer {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        extractor: Arc<dyn EntityExtractor>,
        embedder: Arc<dyn Embedder>,
    ) -> ScoringResult<Self> {
        Ok(Self {
            knowledge,
            extractor,
            embedder,
            published_in: Regex::new(r"(?i)published in \d{4}")?,
            titled: Regex::new(r#"(?i)titled\s*".+?""#)?,
            url: Regex::new(r"https?://\S+")?,
        })
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Score in `[0, 1]`. Fails with `UnknownTopic` for unregistered topics.
    pub async fn score(&self, answer: &str, topic_id: &str) -> ScoringResult<f64> {
        Ok(self.evaluate(answer, topic_id).await?.score)
    }

    /// Score plus the per-signal breakdown.
    pub async fn evaluate(&self, answer: &str, topic_id: &str) -> ScoringResult<FactReport> {
        let fact = self.knowledge.get(topic_id)?;

        let entities = self.extractor.extract_entities(answer);
        let people = texts_with_label(&entities, EntityLabel::Person);
        let dates = texts_with_label(&entities, EntityLabel::Date);

        let similarity = self.similarity(answer, fact).await?;

        let breakdown = PenaltyBreakdown {
            entity_penalty: entity_penalty(&people, fact),
            date_penalty: date_penalty(&dates, fact),
            specificity_penalty: self.specificity_penalty(answer),
            source_penalty: self.source_penalty(answer, fact),
            semantic_penalty: semantic_penalty(similarity),
        };
        let score = breakdown.score();

        debug!(
            topic = topic_id,
            score,
            entity = breakdown.entity_penalty,
            date = breakdown.date_penalty,
            specificity = breakdown.specificity_penalty,
            source = breakdown.source_penalty,
            semantic = breakdown.semantic_penalty,
            "fact score"
        );

        Ok(FactReport {
            topic_id: topic_id.to_string(),
            score,
            breakdown,
            similarity,
        })
    }

    /// Penalty for fabricated citation detail.
    pub fn specificity_penalty(&self, answer: &str) -> f64 {
        let mut penalty = 0.0;
        if self.published_in.is_match(answer) {
            penalty += FABRICATED_DETAIL_PENALTY;
        }
        if self.titled.is_match(answer) {
            penalty += FABRICATED_DETAIL_PENALTY;
        }
        penalty
    }

    /// Penalty for URLs outside the topic's verified sources.
    pub fn source_penalty(&self, answer: &str, fact: &KnowledgeFact) -> f64 {
        self.url
            .find_iter(answer)
            .filter(|m| !fact.is_verified_source(m.as_str()))
            .count() as f64
            * UNVERIFIED_SOURCE_PENALTY
    }

    async fn similarity(&self, answer: &str, fact: &KnowledgeFact) -> ScoringResult<f64> {
        let (reference, candidate) = futures::try_join!(
            self.embedder.embed(&fact.reference_text),
            self.embedder.embed(answer)
        )?;
        Ok(cosine_similarity(&reference, &candidate)? as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::entities::{Entity, MockEntityExtractor};

    fn light_bulb() -> KnowledgeFact {
        KnowledgeBase::builtin().get("light_bulb").unwrap().clone()
    }

    fn scorer_with(entities: Vec<Entity>, similarity_vectors: (Vec<f32>, Vec<f32>)) -> FactScorer {
        let mut extractor = MockEntityExtractor::new();
        extractor
            .expect_extract_entities()
            .returning(move |_| entities.clone());

        let fact = light_bulb();
        let (reference, answer) = similarity_vectors;
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(move |text| {
            if text == fact.reference_text {
                Ok(reference.clone())
            } else {
                Ok(answer.clone())
            }
        });

        FactScorer::new(
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(extractor),
            Arc::new(embedder),
        )
        .unwrap()
    }

    fn aligned() -> (Vec<f32>, Vec<f32>) {
        (vec![1.0, 0.0], vec![1.0, 0.0])
    }

    #[test]
    fn entity_penalty_rules() {
        let fact = light_bulb();
        assert_eq!(entity_penalty(&["Thomas Edison"], &fact), 0.0);
        assert_eq!(entity_penalty(&["Thomas Edison", "Joseph Swan"], &fact), 0.0);
        assert_eq!(entity_penalty(&[], &fact), MISSING_PRIMARY_ENTITY_PENALTY);
        assert_eq!(entity_penalty(&["Joseph Swan"], &fact), MISSING_PRIMARY_ENTITY_PENALTY);
        assert!(
            (entity_penalty(&["J.C. Huyck"], &fact)
                - (MISSING_PRIMARY_ENTITY_PENALTY + UNKNOWN_ENTITY_PENALTY))
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn unknown_entity_penalty_applies_once() {
        let fact = light_bulb();
        let one = entity_penalty(&["Thomas Edison", "Nikola Tesla"], &fact);
        let two = entity_penalty(&["Thomas Edison", "Nikola Tesla", "Ada Lovelace"], &fact);
        assert_eq!(one, UNKNOWN_ENTITY_PENALTY);
        assert_eq!(two, UNKNOWN_ENTITY_PENALTY);
    }

    #[test]
    fn date_penalty_rules() {
        let fact = light_bulb();
        assert_eq!(date_penalty(&["1879"], &fact), 0.0);
        assert_eq!(date_penalty(&["March 29, 1879"], &fact), 0.0);
        assert_eq!(date_penalty(&["1878", "1879"], &fact), 0.0);
        assert_eq!(date_penalty(&["1878"], &fact), WRONG_DATE_PENALTY);
        assert_eq!(date_penalty(&[], &fact), MISSING_DATE_PENALTY);
    }

    #[test]
    fn date_penalty_skipped_without_canonical_date() {
        let mut fact = light_bulb();
        fact.canonical_date = None;
        assert_eq!(date_penalty(&[], &fact), 0.0);
        assert_eq!(date_penalty(&["1900"], &fact), 0.0);
    }

    #[test]
    fn semantic_penalty_threshold() {
        assert_eq!(semantic_penalty(0.95), 0.0);
        assert_eq!(semantic_penalty(0.8), 0.0);
        assert!((semantic_penalty(0.6) - 0.4).abs() < 1e-12);
        assert!((semantic_penalty(-0.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn specificity_patterns_stack() {
        let scorer = scorer_with(vec![], aligned());
        assert_eq!(scorer.specificity_penalty("A plain answer."), 0.0);
        assert_eq!(
            scorer.specificity_penalty("It was PUBLISHED IN 1873 by someone."),
            FABRICATED_DETAIL_PENALTY
        );
        assert_eq!(
            scorer.specificity_penalty(r#"a paper titled "On Glowing Filaments""#),
            FABRICATED_DETAIL_PENALTY
        );
        assert!(
            (scorer.specificity_penalty(
                r#"published in 1873 in a paper titled "Glow""#
            ) - 0.6)
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn source_penalty_compounds_per_unverified_url() {
        let scorer = scorer_with(vec![], aligned());
        let fact = light_bulb();
        assert_eq!(
            scorer.source_penalty(
                "See https://en.wikipedia.org/wiki/Incandescent_light_bulb for more.",
                &fact
            ),
            0.0
        );
        assert_eq!(
            scorer.source_penalty("See https://fake.example/bulb", &fact),
            UNVERIFIED_SOURCE_PENALTY
        );
        assert!(
            (scorer.source_penalty("http://a.example/x and https://b.example/y", &fact) - 0.6)
                .abs()
                < 1e-12
        );
    }

    #[tokio::test]
    async fn clean_answer_scores_one() {
        let scorer = scorer_with(
            vec![
                Entity::new("Thomas Edison", EntityLabel::Person),
                Entity::new("1879", EntityLabel::Date),
            ],
            aligned(),
        );
        let report = scorer
            .evaluate("Thomas Edison invented the light bulb in 1879.", "light_bulb")
            .await
            .unwrap();
        assert!(report.breakdown.is_clean());
        assert_eq!(report.score, 1.0);
    }

    #[tokio::test]
    async fn penalties_sum_before_clamping() {
        let scorer = scorer_with(
            vec![
                Entity::new("J.C. Huyck", EntityLabel::Person),
                Entity::new("1873", EntityLabel::Date),
            ],
            (vec![1.0, 0.0], vec![0.0, 1.0]),
        );
        let report = scorer
            .evaluate(
                r#"J.C. Huyck published in 1873 a paper titled "Glow", see https://x.example"#,
                "light_bulb",
            )
            .await
            .unwrap();
        assert!(report.breakdown.total() > 1.0);
        assert_eq!(report.score, 0.0);
    }

    #[tokio::test]
    async fn unknown_topic_fails() {
        let scorer = scorer_with(vec![], aligned());
        let err = scorer.score("anything", "telephone").await.unwrap_err();
        assert!(matches!(err, crate::ScoringError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Err(crate::EmbeddingError::EmptyResponse));
        let mut extractor = MockEntityExtractor::new();
        extractor.expect_extract_entities().returning(|_| Vec::new());
        let scorer = FactScorer::new(
            Arc::new(KnowledgeBase::builtin()),
            Arc::new(extractor),
            Arc::new(embedder),
        )
        .unwrap();
        let err = scorer.score("x", "light_bulb").await.unwrap_err();
        assert!(matches!(err, crate::ScoringError::Embedding(_)));
    }
}
