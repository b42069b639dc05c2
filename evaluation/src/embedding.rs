//! Text embedding capability and cosine similarity.
//!
//! Two backends ship with the crate:
//! - [`OllamaEmbedder`] calls a local Ollama server's `/api/embed`.
//! - [`HashingEmbedder`] is a deterministic bag-of-words embedding that needs
//!   no model at all, for offline runs and tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EmbeddingError;

/// Default Ollama embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
/// Default dimensionality of [`HashingEmbedder`].
pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Embed text into a fixed-size vector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Cosine similarity of two vectors.
///
/// A zero vector has no direction; its similarity to anything is `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

// ── Ollama ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: HttpClient,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        let base_url = base_url.into();
        let http = HttpClient::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed {
                endpoint: base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::RequestFailed {
                    endpoint: url.clone(),
                    reason: format!("failed to parse embedding response: {e}"),
                })?;

        let vector = parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)?;
        debug!(model = %self.model, dimensions = vector.len(), "embedded text");
        Ok(vector)
    }
}

// ── Hashing ─────────────────────────────────────────────────────────────────

/// Feature-hashed bag-of-words embedding, L2-normalised.
///
/// Each lowercase alphanumeric token is hashed with blake3; the hash picks a
/// bucket and a sign. Texts sharing vocabulary land close together.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Synchronous form of [`Embedder::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&bytes[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        l2_normalize(vector)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }
}

fn l2_normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.into_iter().map(|v| v / norm).collect()
    } else {
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = [1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn cosine_rejects_dimension_mismatch() {
        let err = cosine_similarity(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { left: 1, right: 2 }
        ));
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalised() {
        let e = HashingEmbedder::default();
        let a = e.embed_sync("Thomas Edison invented the light bulb");
        let b = e.embed_sync("Thomas Edison invented the light bulb");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASHING_DIMENSIONS);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_embedder_ignores_case_and_punctuation() {
        let e = HashingEmbedder::default();
        assert_eq!(e.embed_sync("Light bulb!"), e.embed_sync("light BULB"));
    }

    #[test]
    fn hashing_embedder_ranks_related_text_higher() {
        let e = HashingEmbedder::new(1024);
        let reference = e.embed_sync("the incandescent light bulb was developed by thomas edison");
        let related = e.embed_sync("thomas edison developed the light bulb");
        let unrelated = e.embed_sync("penguins swim in cold antarctic water");
        let related_sim = cosine_similarity(&reference, &related).unwrap();
        let unrelated_sim = cosine_similarity(&reference, &unrelated).unwrap();
        assert!(related_sim > unrelated_sim);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_sync("").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn hashing_embedder_implements_trait() {
        let e: Box<dyn Embedder> = Box::new(HashingEmbedder::new(16));
        assert_eq!(e.embed("abc").await.unwrap().len(), 16);
    }
}
