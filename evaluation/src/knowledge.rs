//! Knowledge base of verified facts, one entry per topic.
//!
//! The base is built once and then only read. Extra topics can be loaded
//! from a TOML file of the form:
//!
//! ```toml
//! [[facts]]
//! topic_id = "telephone"
//! canonical_entities = ["Alexander Graham Bell"]
//! alternate_entities = ["Elisha Gray", "Antonio Meucci"]
//! canonical_date = 1876
//! verified_source_prefixes = ["https://en.wikipedia.org/wiki/Telephone"]
//! reference_text = "The telephone was patented by Alexander Graham Bell in 1876."
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ScoringError, ScoringResult};

/// A verified fact about one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFact {
    pub topic_id: String,
    /// Canonical people, primary first (e.g. the credited inventor).
    pub canonical_entities: Vec<String>,
    /// Other people legitimately associated with the topic.
    #[serde(default)]
    pub alternate_entities: BTreeSet<String>,
    #[serde(default)]
    pub canonical_date: Option<i32>,
    #[serde(default)]
    pub verified_source_prefixes: BTreeSet<String>,
    /// Reference summary used for the semantic comparison.
    pub reference_text: String,
}

impl KnowledgeFact {
    /// The primary canonical entity, if any is declared.
    pub fn primary_entity(&self) -> Option<&str> {
        self.canonical_entities.first().map(String::as_str)
    }

    /// Whether `url` starts with one of the verified prefixes.
    pub fn is_verified_source(&self, url: &str) -> bool {
        self.verified_source_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    facts: Vec<KnowledgeFact>,
}

/// Topic-keyed table of [`KnowledgeFact`]s.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    facts: HashMap<String, KnowledgeFact>,
}

impl KnowledgeBase {
    /// An empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Knowledge base holding the built-in `light_bulb` topic.
    pub fn builtin() -> Self {
        let mut facts = HashMap::new();
        let light_bulb = light_bulb_fact();
        facts.insert(light_bulb.topic_id.clone(), light_bulb);
        Self { facts }
    }

    /// Register a fact. Fails if its topic is already present.
    pub fn insert(&mut self, fact: KnowledgeFact) -> ScoringResult<()> {
        if self.facts.contains_key(&fact.topic_id) {
            return Err(ScoringError::DuplicateTopic(fact.topic_id));
        }
        self.facts.insert(fact.topic_id.clone(), fact);
        Ok(())
    }

    /// Parse `[[facts]]` from TOML and register each one.
    ///
    /// All or nothing: a duplicate anywhere in the batch leaves the base
    /// untouched.
    pub fn extend_from_toml(&mut self, source: &str) -> ScoringResult<usize> {
        let file: KnowledgeFile = toml::from_str(source)?;

        let mut incoming = HashSet::with_capacity(file.facts.len());
        for fact in &file.facts {
            if self.contains(&fact.topic_id) || !incoming.insert(fact.topic_id.as_str()) {
                return Err(ScoringError::DuplicateTopic(fact.topic_id.clone()));
            }
        }

        let count = file.facts.len();
        for fact in file.facts {
            self.facts.insert(fact.topic_id.clone(), fact);
        }
        Ok(count)
    }

    /// Load extra topics from a TOML file.
    pub fn extend_from_file(&mut self, path: &Path) -> ScoringResult<usize> {
        let source =
            std::fs::read_to_string(path).map_err(|source| ScoringError::KnowledgeBaseIo {
                path: path.display().to_string(),
                source,
            })?;
        let count = self.extend_from_toml(&source)?;
        info!(path = %path.display(), topics = count, "loaded knowledge base");
        Ok(count)
    }

    /// Look up a topic.
    pub fn get(&self, topic_id: &str) -> ScoringResult<&KnowledgeFact> {
        self.facts
            .get(topic_id)
            .ok_or_else(|| ScoringError::UnknownTopic(topic_id.to_string()))
    }

    pub fn contains(&self, topic_id: &str) -> bool {
        self.facts.contains_key(topic_id)
    }

    /// Registered topic ids, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.facts.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

fn light_bulb_fact() -> KnowledgeFact {
    KnowledgeFact {
        topic_id: "light_bulb".to_string(),
        canonical_entities: vec!["Thomas Edison".to_string()],
        alternate_entities: ["Joseph Swan", "Hiram Maxim", "Humphry Davy"]
            .into_iter()
            .map(String::from)
            .collect(),
        canonical_date: Some(1879),
        verified_source_prefixes: [
            "https://en.wikipedia.org/wiki/Incandescent_light_bulb",
            "https://www.britannica.com/technology/light-bulb",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        reference_text: "The incandescent light bulb was developed by Thomas Edison in 1879. \
            Other inventors like Joseph Swan and Hiram Maxim contributed earlier versions. \
            Edison's version used a carbon filament which lasted longer and became practical \
            for everyday use."
            .to_string(),
    }
}
