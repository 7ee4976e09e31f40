//! Embedding capability — the trait the cluster selector depends on, plus
//! the HTTP-backed implementation and a deterministic mock for tests.
//!
//! Any failure here is fatal for the whole run: without a full set of
//! vectors there is nothing meaningful to cluster. Retries, if desired,
//! belong to the service behind the trait, not to this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, ProviderConfig};
use crate::tokenizer::strip_reserved;

/// Errors from the embedding service.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding service returned {returned} vectors for {expected} inputs")]
    CountMismatch { expected: usize, returned: usize },

    #[error("embedding dimensionality varies across segments ({first} vs {other})")]
    DimensionMismatch { first: usize, other: usize },

    #[error("embedding service error: {0}")]
    Service(String),
}

/// Maps text to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, all of the
/// same dimensionality — clustering is undefined otherwise, and
/// [`verify_uniform_dimensions`] enforces it after the call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier for logs.
    fn id(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Prepare segment text for the embedding service.
///
/// Reserved control sequences are stripped (the service rejects or
/// mis-encodes them); a segment that is empty after stripping becomes a
/// single-space placeholder so the 1:1 index association between segments
/// and vectors survives.
#[must_use]
pub fn sanitize_for_embedding(text: &str) -> String {
    let stripped = strip_reserved(text);
    if stripped.trim().is_empty() {
        " ".to_string()
    } else {
        stripped
    }
}

/// Check the batch invariant: same count as inputs, uniform dimensionality.
pub fn verify_uniform_dimensions(
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            returned: vectors.len(),
        });
    }
    if let Some(first) = vectors.first() {
        for vector in vectors {
            if vector.len() != first.len() {
                return Err(EmbeddingError::DimensionMismatch {
                    first: first.len(),
                    other: vector.len(),
                });
            }
        }
    }
    Ok(())
}

// ── HTTP provider ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-style `/embeddings` endpoint client.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
    model: String,
}

impl HttpEmbeddingProvider {
    /// # Errors
    ///
    /// [`ConfigError::InvalidBaseUrl`] when the endpoint cannot be resolved
    /// against the configured base URL.
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint("embeddings")?,
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn id(&self) -> &str {
        "http-embeddings"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequestBody {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut parsed: EmbeddingResponseBody = response.json().await?;
        // The service documents input order but keys each vector by index;
        // trust the index.
        parsed.data.sort_by_key(|datum| datum.index);
        let vectors: Vec<Vec<f32>> = parsed
            .data
            .into_iter()
            .map(|datum| datum.embedding)
            .collect();

        verify_uniform_dimensions(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

// ── Mock provider ──────────────────────────────────────────────────────

/// Deterministic, offline embedding provider for tests and examples.
///
/// Vectors are derived from character content alone, so identical inputs
/// always embed identically and distinct inputs usually differ — enough
/// structure for k-means to behave sensibly in tests.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { dimensions: 16 }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (position, ch) in text.chars().enumerate() {
            let slot = (ch as usize + position) % self.dimensions;
            vector[slot] += 1.0 + (ch as u32 % 7) as f32;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn id(&self) -> &str {
        "mock-embeddings"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
