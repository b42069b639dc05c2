//! The "analyze" operation: validate, dispatch, select consensus and
//! optionally fact-check the answers against a knowledge-base topic.
//!
//! This is the surface an HTTP layer wraps. Errors classify themselves
//! as client (400) or server (500) failures.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use evaluation::{
    Embedder, FactScorer, HashingEmbedder, KnowledgeBase, OllamaEmbedder, OverconfidenceScorer,
    PatternEntityExtractor, PenaltyBreakdown,
};
use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, EmbeddingBackend};
use crate::consensus::{ConsensusError, ConsensusSelector};
use crate::dispatcher::AgentDispatcher;
use crate::provider::OllamaProvider;
use crate::types::AgentResult;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Body is not a JSON object of the expected shape.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid request: missing query")]
    MissingQuery,

    #[error("Empty query")]
    EmptyQuery,

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// A topic was requested but no fact scorer is configured.
    #[error("Fact checking is not configured")]
    FactCheckUnavailable,

    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

impl AnalyzeError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::MissingQuery | Self::EmptyQuery | Self::UnknownTopic(_)
        )
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// Body of an analyze call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeRequest {
    /// Question sent to every agent. Required, must not be blank.
    #[serde(default)]
    pub query: Option<String>,
    /// Knowledge-base topic to fact-check answers against.
    #[serde(default)]
    pub topic: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Parse a raw JSON body.
    pub fn from_json(body: &str) -> Result<Self, AnalyzeError> {
        serde_json::from_str(body).map_err(|e| AnalyzeError::InvalidRequest(e.to_string()))
    }

    /// The trimmed query, or the client error explaining why there is none.
    pub fn validated_query(&self) -> Result<&str, AnalyzeError> {
        let query = self.query.as_deref().ok_or(AnalyzeError::MissingQuery)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(AnalyzeError::EmptyQuery);
        }
        Ok(query)
    }
}

/// Fact-check outcome for one successful agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FactCheck {
    #[serde(rename = "agent")]
    pub agent_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PenaltyBreakdown>,
    /// Set when scoring failed, e.g. the embedding backend was down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResponse {
    pub request_id: Uuid,
    /// One record per configured model, in completion order.
    pub answers: Vec<AgentResult>,
    pub best_agents: Vec<AgentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fact_checks: Vec<FactCheck>,
    pub completed_at: DateTime<Utc>,
}

/// Dispatcher + consensus + optional fact checking, wired for one model set.
pub struct Analyzer {
    dispatcher: AgentDispatcher,
    models: Vec<String>,
    fact_scorer: Option<Arc<FactScorer>>,
    default_topic: Option<String>,
}

impl Analyzer {
    pub fn new(dispatcher: AgentDispatcher, models: Vec<String>) -> Self {
        Self {
            dispatcher,
            models,
            fact_scorer: None,
            default_topic: None,
        }
    }

    pub fn with_fact_scorer(mut self, scorer: Arc<FactScorer>) -> Self {
        self.fact_scorer = Some(scorer);
        self
    }

    /// Topic used when a request names none.
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(topic.into());
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn fact_scorer(&self) -> Option<&Arc<FactScorer>> {
        self.fact_scorer.as_ref()
    }

    /// Build the full production stack from configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let provider =
            OllamaProvider::new(&config.provider.base_url, config.timeouts.connect_timeout())
                .context("failed to build answer provider")?;
        let confidence =
            Arc::new(OverconfidenceScorer::standard().context("failed to compile lexicon")?);
        let dispatcher =
            AgentDispatcher::new(Arc::new(provider), confidence, config.dispatch_config());

        let fact_scorer = Arc::new(build_fact_scorer(config)?);
        if let Some(topic) = &config.default_topic {
            if !fact_scorer.knowledge().contains(topic) {
                anyhow::bail!("default_topic {topic:?} is not in the knowledge base");
            }
        }

        let mut analyzer =
            Self::new(dispatcher, config.models.clone()).with_fact_scorer(fact_scorer);
        if let Some(topic) = &config.default_topic {
            analyzer = analyzer.with_default_topic(topic);
        }
        Ok(analyzer)
    }

    /// Run one analyze round.
    ///
    /// Request validation happens before any model is called. Per-agent
    /// failures never fail the round.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AnalyzeError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("analyze", %request_id);
        self.analyze_inner(request_id, request).instrument(span).await
    }

    async fn analyze_inner(
        &self,
        request_id: Uuid,
        request: &AnalyzeRequest,
    ) -> Result<AnalyzeResponse, AnalyzeError> {
        let query = request.validated_query()?;
        let topic = request.topic.clone().or_else(|| self.default_topic.clone());
        let fact_scorer = match &topic {
            Some(topic) => {
                let scorer = self
                    .fact_scorer
                    .as_ref()
                    .ok_or(AnalyzeError::FactCheckUnavailable)?;
                if !scorer.knowledge().contains(topic) {
                    return Err(AnalyzeError::UnknownTopic(topic.clone()));
                }
                Some(scorer)
            }
            None => None,
        };

        let results = self.dispatcher.dispatch(query, &self.models).await;
        let consensus = ConsensusSelector::select(results)?;

        let fact_checks = match (fact_scorer, &topic) {
            (Some(scorer), Some(topic)) => fact_check(scorer, &consensus.answers, topic).await,
            _ => Vec::new(),
        };

        info!(
            answers = consensus.answers.len(),
            best = consensus.best_agents.len(),
            max_score = consensus.max_score,
            fact_checks = fact_checks.len(),
            "analyze complete"
        );

        Ok(AnalyzeResponse {
            request_id,
            answers: consensus.answers,
            best_agents: consensus.best_agents,
            topic,
            fact_checks,
            completed_at: Utc::now(),
        })
    }
}

/// Score every successful answer concurrently. Failures are reported per
/// agent, never propagated.
async fn fact_check(scorer: &FactScorer, answers: &[AgentResult], topic: &str) -> Vec<FactCheck> {
    let checks = answers.iter().filter(|a| a.is_ok()).map(|answer| async move {
        match scorer.evaluate(answer.response_text(), topic).await {
            Ok(report) => FactCheck {
                agent_id: answer.agent_id().to_string(),
                score: report.score,
                breakdown: Some(report.breakdown),
                error: None,
            },
            Err(e) => {
                warn!(model = %answer.agent_id(), error = %e, "fact check failed");
                FactCheck {
                    agent_id: answer.agent_id().to_string(),
                    score: 0.0,
                    breakdown: None,
                    error: Some(e.to_string()),
                }
            }
        }
    });
    join_all(checks).await
}

/// Knowledge base (built-in plus the configured file), pattern extractor
/// and the configured embedding backend.
pub fn build_fact_scorer(config: &AppConfig) -> anyhow::Result<FactScorer> {
    let mut knowledge = KnowledgeBase::builtin();
    if let Some(path) = &config.knowledge_base {
        knowledge
            .extend_from_file(path)
            .with_context(|| format!("failed to load knowledge base {}", path.display()))?;
    }

    let embedder: Arc<dyn Embedder> = match config.embedding.backend {
        EmbeddingBackend::Ollama => Arc::new(
            OllamaEmbedder::new(&config.provider.base_url, &config.embedding.model)
                .context("failed to build embedder")?,
        ),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.embedding.dimensions)),
    };

    let extractor = PatternEntityExtractor::new().context("failed to compile entity patterns")?;
    FactScorer::new(Arc::new(knowledge), Arc::new(extractor), embedder)
        .context("failed to build fact scorer")
}
