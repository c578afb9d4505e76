//! Embedding functions bound to collections.
//!
//! A collection is tied to exactly one embedding function for its lifetime;
//! [`EmbeddingFunction::name`] is the identity recorded with the collection.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::config::{EmbedderKind, EmbeddingConfig};
use crate::core::errors::RagError;

#[async_trait]
pub trait EmbeddingFunction: Send + Sync {
    /// Stable identity, including anything that changes the vector space.
    fn name(&self) -> String;

    /// Embeds each input; the output has one vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, RagError> {
        self.embed(&[input.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Internal("embedding function returned no vectors".into()))
    }
}

pub fn embedder_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingFunction> {
    match config.provider {
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
        EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
            config.base_url.clone(),
            config.model.clone(),
        )),
    }
}

const STOP_WORDS: [&str; 24] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of",
    "on", "or", "that", "the", "this", "to", "was", "what", "which", "with",
];

/// In-process embedder using signed feature hashing over lowercase word
/// tokens. Deterministic across processes and platforms, so vectors persisted
/// by one run stay comparable in the next.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(bytes);

            let index = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingFunction for HashingEmbedder {
    fn name(&self) -> String {
        format!("hashing:{}", self.dimension)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Delegates to an Ollama-compatible `/api/embed` endpoint.
#[derive(Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingFunction for OllamaEmbedder {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(RagError::store)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::StoreUnavailable(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: EmbedResponse = res.json().await.map_err(RagError::store)?;
        if payload.embeddings.len() != inputs.len() {
            return Err(RagError::Internal(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                payload.embeddings.len()
            )));
        }

        Ok(payload.embeddings)
    }
}
