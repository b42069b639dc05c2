//! Multi-agent answer dispatch and consensus
//!
//! One query goes to several language models at once. Every model ends
//! in exactly one [`AgentResult`] (ok, timeout, connection error or error),
//! successful answers are scored by the overconfidence model, and the
//! agents tied at the top score form the consensus.
//!
//! - [`provider`]: the [`AnswerProvider`] capability and the Ollama client
//! - [`policy`]: per-model timeout table
//! - [`dispatcher`]: concurrent fan-out with partial-failure tolerance
//! - [`consensus`]: best-agent selection
//! - [`analyze`]: request validation, fact checking and the response shape
//! - [`config`]: TOML + environment configuration

pub mod analyze;
pub mod config;
pub mod consensus;
pub mod dispatcher;
pub mod policy;
pub mod provider;
pub mod types;

pub use analyze::{AnalyzeError, AnalyzeRequest, AnalyzeResponse, Analyzer, FactCheck};
pub use config::{AppConfig, ConfigError, EmbeddingBackend};
pub use consensus::{Consensus, ConsensusError, ConsensusSelector};
pub use dispatcher::{AgentDispatcher, DispatchConfig};
pub use policy::TimeoutPolicy;
pub use provider::{
    AnswerProvider, GenerationRequest, OllamaProvider, ProviderError, SharedAnswerProvider,
};
pub use types::{AgentResult, AgentStatus};
