//! Application configuration.
//!
//! Layers, highest precedence first: CLI flags (applied by the binary),
//! environment variables, the TOML config file, built-in defaults.
//!
//! ```toml
//! models = ["phi3", "qwen2.5:1.5b", "deepseek-r1:1.5b"]
//! default_topic = "light_bulb"
//!
//! [provider]
//! base_url = "http://localhost:11434"
//! max_output_tokens = 200
//!
//! [timeouts]
//! connect_timeout_secs = 5
//! default_read_timeout_secs = 120
//! [timeouts.overrides]
//! "deepseek-r1:1.5b" = 500
//!
//! [prompts]
//! phi3 = "Answer factually and concisely:\n{query}"
//!
//! [embedding]
//! backend = "hashing"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use evaluation::embedding::{DEFAULT_EMBEDDING_MODEL, DEFAULT_HASHING_DIMENSIONS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dispatcher::{DispatchConfig, DEFAULT_MAX_OUTPUT_TOKENS, QUERY_PLACEHOLDER};
use crate::policy::TimeoutPolicy;
use crate::provider::DEFAULT_OLLAMA_URL;

pub const ENV_CONFIG_PATH: &str = "CONSENSUS_CONFIG";
pub const ENV_OLLAMA_URL: &str = "CONSENSUS_OLLAMA_URL";
pub const ENV_MODELS: &str = "CONSENSUS_MODELS";
pub const ENV_EMBEDDING_MODEL: &str = "CONSENSUS_EMBEDDING_MODEL";

const DEFAULT_MODELS: &[&str] = &["phi3", "qwen2.5:1.5b", "deepseek-r1:1.5b"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Model server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub max_output_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embed`.
    #[default]
    Ollama,
    /// Offline bag-of-words hashing.
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Embedding model name for the Ollama backend.
    pub model: String,
    /// Vector size for the hashing backend.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub timeouts: TimeoutPolicy,
    /// Models queried per request, in dispatch order.
    pub models: Vec<String>,
    /// model id → prompt template
    pub prompts: BTreeMap<String, String>,
    pub embedding: EmbeddingConfig,
    /// Extra knowledge-base topics (TOML `[[facts]]`).
    pub knowledge_base: Option<PathBuf>,
    /// Topic fact-checked when a request names none.
    pub default_topic: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            timeouts: TimeoutPolicy::default(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            prompts: BTreeMap::new(),
            embedding: EmbeddingConfig::default(),
            knowledge_base: None,
            default_topic: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a config file. Does not apply the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), models = config.models.len(), "loaded config");
        Ok(config)
    }

    /// File (explicit path, else `CONSENSUS_CONFIG`, else defaults) with
    /// environment overrides applied, then validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `get`.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "provider url from environment");
            self.provider.base_url = url.trim().to_string();
        }
        if let Some(raw) = get(ENV_MODELS) {
            let models: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !models.is_empty() {
                debug!(?models, "models from environment");
                self.models = models;
            }
        }
        if let Some(model) = get(ENV_EMBEDDING_MODEL).filter(|v| !v.trim().is_empty()) {
            self.embedding.model = model.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("at least one model is required".into()));
        }
        if let Some(blank) = self.models.iter().find(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank model id {blank:?}")));
        }
        self.timeouts.validate().map_err(ConfigError::Invalid)?;
        if self.provider.max_output_tokens == 0 {
            return Err(ConfigError::Invalid("max_output_tokens must be > 0".into()));
        }
        if let Some((model, _)) = self
            .prompts
            .iter()
            .find(|(_, template)| !template.contains(QUERY_PLACEHOLDER))
        {
            return Err(ConfigError::Invalid(format!(
                "prompt template for {model} lacks {QUERY_PLACEHOLDER}"
            )));
        }
        if self.embedding.backend == EmbeddingBackend::Hashing && self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid("embedding dimensions must be > 0".into()));
        }
        Ok(())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            timeouts: self.timeouts.clone(),
            max_output_tokens: self.provider.max_output_tokens,
            prompt_templates: self.prompts.clone(),
        }
    }
}
