//! Error taxonomy for the scoring layer.
//!
//! Scoring is deterministic apart from the embedding capability, so the
//! surface is small: caller mistakes (unknown or duplicate topics), broken
//! knowledge-base files, and embedding backend failures.

use thiserror::Error;

/// Errors from the embedding capability.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP request to the embedding endpoint failed.
    #[error("embedding request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    /// Non-2xx response from the embedding endpoint.
    #[error("embedding endpoint returned HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The endpoint answered but produced no vector.
    #[error("embedding endpoint returned no vectors")]
    EmptyResponse,

    /// Two vectors of different dimensionality were compared.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Errors from fact scoring and knowledge-base management.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// No KnowledgeFact is registered under this topic id.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// A second KnowledgeFact was registered under an existing topic id.
    #[error("duplicate topic: {0}")]
    DuplicateTopic(String),

    /// The knowledge-base file could not be read.
    #[error("failed to read knowledge base {path}: {source}")]
    KnowledgeBaseIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The knowledge-base file is not valid TOML for `[[facts]]`.
    #[error("invalid knowledge base: {0}")]
    KnowledgeBaseParse(#[from] toml::de::Error),

    /// A lexicon term or pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The embedding capability failed while computing the semantic penalty.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Result alias for scoring operations.
pub type ScoringResult<T> = Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_topic_names_the_topic() {
        let err = ScoringError::UnknownTopic("telephone".into());
        assert_eq!(err.to_string(), "unknown topic: telephone");
    }

    #[test]
    fn embedding_error_converts() {
        let err: ScoringError = EmbeddingError::EmptyResponse.into();
        assert!(matches!(err, ScoringError::Embedding(_)));
    }
}
