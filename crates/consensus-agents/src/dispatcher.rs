//! Agent dispatcher: JoinSet fan-out/fan-in over the configured models.
//!
//! ```text
//! dispatch(query, models)
//!   JoinSet::spawn(provider.generate(model_i)) × N   one task per model
//!   join_next_with_id() until empty                  wait for all, collect all
//!     Ok(text)                → status=ok, score = 1 − overconfidence
//!     Err(Timeout)            → status=timeout, measured elapsed
//!     Err(ConnectFailure)     → status=connection_error
//!     Err(EmptyAnswer | ..)   → status=error
//!     task panicked           → status=error
//! ```
//!
//! The result set always holds exactly one record per requested model.
//! Records arrive in completion order. There is no retry and no
//! cancellation of the remote computation: a local timeout just stops
//! waiting.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use evaluation::OverconfidenceScorer;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::policy::TimeoutPolicy;
use crate::provider::{GenerationRequest, ProviderError, SharedAnswerProvider};
use crate::types::AgentResult;

/// Default cap on generated tokens per answer.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 200;
/// Placeholder replaced by the user query in prompt templates.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Knobs for one dispatch round.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub timeouts: TimeoutPolicy,
    pub max_output_tokens: u32,
    /// model id → prompt template containing `{query}`
    pub prompt_templates: BTreeMap<String, String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutPolicy::default(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            prompt_templates: BTreeMap::new(),
        }
    }
}

impl DispatchConfig {
    /// Prompt sent to `model_id`: its template with the query substituted,
    /// or the bare query.
    pub fn render_prompt(&self, model_id: &str, query: &str) -> String {
        match self.prompt_templates.get(model_id) {
            Some(template) => template.replace(QUERY_PLACEHOLDER, query),
            None => query.to_string(),
        }
    }

    fn request_for(&self, model_id: &str, query: &str) -> GenerationRequest {
        GenerationRequest {
            model_id: model_id.to_string(),
            prompt: self.render_prompt(model_id, query),
            connect_timeout: self.timeouts.connect_timeout(),
            read_timeout: self.timeouts.read_timeout_for(model_id),
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Fans a query out to every model and scores each answer.
pub struct AgentDispatcher {
    provider: SharedAnswerProvider,
    confidence: Arc<OverconfidenceScorer>,
    config: DispatchConfig,
}

impl AgentDispatcher {
    pub fn new(
        provider: SharedAnswerProvider,
        confidence: Arc<OverconfidenceScorer>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            provider,
            confidence,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Query every model concurrently; block until each has reached a
    /// terminal state. Never fails: every outcome becomes an [`AgentResult`].
    pub async fn dispatch(&self, query: &str, models: &[String]) -> Vec<AgentResult> {
        info!(models = models.len(), "dispatching query");

        let mut join_set: JoinSet<AgentResult> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, String> = HashMap::with_capacity(models.len());

        for model in models {
            let provider = self.provider.clone();
            let confidence = self.confidence.clone();
            let request = self.config.request_for(model, query);
            let handle = join_set.spawn(run_agent(provider, confidence, request));
            in_flight.insert(handle.id(), model.clone());
        }

        let mut results = Vec::with_capacity(models.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    debug!(
                        model = %result.agent_id(),
                        status = %result.status(),
                        score = result.score(),
                        elapsed_secs = result.elapsed_seconds(),
                        "agent finished"
                    );
                    results.push(result);
                }
                Err(e) => {
                    let model = in_flight.remove(&e.id()).unwrap_or_default();
                    warn!(model = %model, error = %e, "agent task panicked");
                    results.push(AgentResult::error(model, format!("agent task failed: {e}")));
                }
            }
        }

        info!(
            answered = results.iter().filter(|r| r.is_ok()).count(),
            total = results.len(),
            "dispatch complete"
        );
        results
    }
}

async fn run_agent(
    provider: SharedAnswerProvider,
    confidence: Arc<OverconfidenceScorer>,
    request: GenerationRequest,
) -> AgentResult {
    let start = Instant::now();
    // Local ceiling: a provider that ignores its own timeouts still terminates.
    let ceiling = request.connect_timeout + request.read_timeout;

    let outcome = match tokio::time::timeout(ceiling, provider.generate(&request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProviderError::Timeout {
            read_timeout: request.read_timeout,
        }),
    };

    let model = request.model_id;
    match outcome {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                return AgentResult::error(model, ProviderError::EmptyAnswer);
            }
            let score = confidence.score(text);
            AgentResult::ok(model, text, score, start.elapsed())
        }
        Err(ProviderError::Timeout { .. }) => AgentResult::timeout(model, start.elapsed()),
        Err(ProviderError::ConnectFailure { endpoint, reason }) => {
            warn!(
                model = %model,
                endpoint = %endpoint,
                reason = %reason,
                "model server unreachable"
            );
            AgentResult::connection_error(model)
        }
        Err(other) => AgentResult::error(model, other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::MockAnswerProvider;
    use crate::types::AgentStatus;

    fn confidence() -> Arc<OverconfidenceScorer> {
        Arc::new(OverconfidenceScorer::standard().unwrap())
    }

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_prompt_uses_template_when_present() {
        let mut config = DispatchConfig::default();
        config.prompt_templates.insert(
            "phi3".into(),
            "Answer factually and concisely:\n{query}".into(),
        );
        assert_eq!(
            config.render_prompt("phi3", "Who invented the light bulb?"),
            "Answer factually and concisely:\nWho invented the light bulb?"
        );
        assert_eq!(config.render_prompt("qwen", "Q"), "Q");
    }

    #[test]
    fn request_carries_policy_timeouts() {
        let config = DispatchConfig::default();
        let request = config.request_for("deepseek-r1:1.5b", "Q");
        assert_eq!(request.connect_timeout, Duration::from_secs(5));
        assert_eq!(request.read_timeout, Duration::from_secs(500));
        assert_eq!(request.max_output_tokens, 200);
    }

    #[tokio::test]
    async fn success_is_scored_by_confidence() {
        let mut provider = MockAnswerProvider::new();
        provider
            .expect_generate()
            .returning(|_| Ok("  It is definitely blue.  ".to_string()));
        let dispatcher =
            AgentDispatcher::new(Arc::new(provider), confidence(), DispatchConfig::default());

        let results = dispatcher.dispatch("What colour is the sky?", &models(&["A"])).await;
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.status(), AgentStatus::Ok);
        assert_eq!(r.response_text(), "It is definitely blue.");
        let expected = evaluation::round_score(1.0 - 0.15 / 5f64.ln());
        assert_eq!(r.score(), expected);
    }

    #[tokio::test]
    async fn blank_answer_is_an_error() {
        let mut provider = MockAnswerProvider::new();
        provider.expect_generate().returning(|_| Ok("   ".to_string()));
        let dispatcher =
            AgentDispatcher::new(Arc::new(provider), confidence(), DispatchConfig::default());

        let results = dispatcher.dispatch("Q", &models(&["A"])).await;
        assert_eq!(results[0].status(), AgentStatus::Error);
        assert_eq!(results[0].score(), 0.0);
        assert!(results[0].response_text().contains("Empty response"));
    }

    #[tokio::test]
    async fn provider_errors_map_to_statuses() {
        let mut provider = MockAnswerProvider::new();
        provider.expect_generate().returning(|req| match req.model_id.as_str() {
            "slow" => Err(ProviderError::Timeout {
                read_timeout: req.read_timeout,
            }),
            "down" => Err(ProviderError::ConnectFailure {
                endpoint: "http://localhost:11434/api/generate".into(),
                reason: "connection refused".into(),
            }),
            _ => Err(ProviderError::Http {
                status: 500,
                body: "model not found".into(),
            }),
        });
        let dispatcher =
            AgentDispatcher::new(Arc::new(provider), confidence(), DispatchConfig::default());

        let results = dispatcher
            .dispatch("Q", &models(&["slow", "down", "broken"]))
            .await;
        assert_eq!(results.len(), 3);
        let status_of = |id: &str| {
            results
                .iter()
                .find(|r| r.agent_id() == id)
                .map(|r| r.status())
                .unwrap()
        };
        assert_eq!(status_of("slow"), AgentStatus::Timeout);
        assert_eq!(status_of("down"), AgentStatus::ConnectionError);
        assert_eq!(status_of("broken"), AgentStatus::Error);
        assert!(results.iter().all(|r| r.score() == 0.0));

        let broken = results.iter().find(|r| r.agent_id() == "broken").unwrap();
        assert!(broken.response_text().contains("model not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_hits_local_ceiling() {
        struct Hanging;
        #[async_trait::async_trait]
        impl crate::provider::AnswerProvider for Hanging {
            async fn generate(&self, _: &GenerationRequest) -> Result<String, ProviderError> {
                tokio::time::sleep(Duration::from_secs(10_000)).await;
                Ok("too late".into())
            }
        }

        let config = DispatchConfig {
            timeouts: TimeoutPolicy::uniform(Duration::from_secs(5), Duration::from_secs(120)),
            ..DispatchConfig::default()
        };
        let dispatcher = AgentDispatcher::new(Arc::new(Hanging), confidence(), config);
        let results = dispatcher.dispatch("Q", &models(&["B"])).await;
        assert_eq!(results[0].status(), AgentStatus::Timeout);
        assert!(results[0].elapsed_seconds() >= 125.0);
    }

    #[tokio::test]
    async fn panicking_agent_still_yields_a_record() {
        struct Panicking;
        #[async_trait::async_trait]
        impl crate::provider::AnswerProvider for Panicking {
            async fn generate(&self, req: &GenerationRequest) -> Result<String, ProviderError> {
                if req.model_id == "bad" {
                    panic!("provider bug");
                }
                Ok("fine".into())
            }
        }

        let dispatcher =
            AgentDispatcher::new(Arc::new(Panicking), confidence(), DispatchConfig::default());
        let results = dispatcher.dispatch("Q", &models(&["good", "bad"])).await;
        assert_eq!(results.len(), 2);
        let bad = results.iter().find(|r| r.agent_id() == "bad").unwrap();
        assert_eq!(bad.status(), AgentStatus::Error);
        assert!(bad.response_text().contains("agent task failed"));
    }

    #[tokio::test]
    async fn zero_models_yields_empty_set() {
        let provider = MockAnswerProvider::new();
        let dispatcher =
            AgentDispatcher::new(Arc::new(provider), confidence(), DispatchConfig::default());
        assert!(dispatcher.dispatch("Q", &[]).await.is_empty());
    }
}
