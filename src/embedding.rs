//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and two concrete providers:
//!
//! - **[`OpenAiEmbeddings`]** — calls an OpenAI-compatible `POST
//!   {base}/embeddings` endpoint with a bearer key.
//! - **[`OllamaEmbeddings`]** — calls a local Ollama instance's
//!   `POST {url}/api/embed` endpoint.
//!
//! Both are stateless beyond the outbound call, order-preserving
//! (`output[i]` corresponds to `input[i]`), and do **not** retry: a failed
//! or timed-out call surfaces as [`KbError::Provider`] and retry policy is
//! left to the caller's infrastructure.
//!
//! Also provides the vector helpers shared with the store:
//! [`vec_to_blob`] / [`blob_to_vec`] for little-endian f32 BLOB encoding,
//! and [`cosine_similarity`] / [`cosine_distance`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{KbError, Result};

/// Converts batches of text into fixed-dimension vectors.
///
/// Injected into the ingestion pipeline and the retriever so tests can
/// substitute a deterministic double for the network provider.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`); recorded per
    /// chunk and checked at query time.
    fn model_name(&self) -> &str;

    /// Vector dimensionality (e.g. 1536).
    fn dims(&self) -> usize;

    /// Embed a batch of non-empty texts; the result has the same length and
    /// order as the input. Provider batch-size and token limits are the
    /// caller's responsibility.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the provider selected by `embedding.provider` in the config.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbeddings::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbeddings::new(config)?)),
        other => Err(KbError::Provider(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| KbError::Provider(e.to_string()))
}

/// Verify batch length and per-vector dimensionality from a provider
/// response; a mismatch means the response is malformed.
fn check_batch(vectors: &[Vec<f32>], expected_len: usize, dims: usize) -> Result<()> {
    if vectors.len() != expected_len {
        return Err(KbError::Provider(format!(
            "embedding response has {} vectors for {} inputs",
            vectors.len(),
            expected_len
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(KbError::Provider(format!(
            "embedding dimension mismatch: expected {}, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(())
}

// ============ OpenAI-compatible provider ============

/// Embedding provider for the OpenAI embeddings API (or any compatible
/// endpoint via the `url` config override).
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            KbError::Provider("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| KbError::Provider(format!("embeddings request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KbError::Provider(format!(
                "embeddings API error {}: {}",
                status, body_text
            )));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KbError::Provider(format!("invalid embeddings response: {}", e)))?;

        // The API is free to reorder items; the index field is authoritative.
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|item| item.embedding).collect();

        check_batch(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

// ============ Ollama provider ============

/// Embedding provider for a local Ollama instance
/// (default `http://localhost:11434`).
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                KbError::Provider(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.base_url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KbError::Provider(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| KbError::Provider(format!("invalid Ollama response: {}", e)))?;

        check_batch(&parsed.embeddings, texts.len(), self.dims)?;
        Ok(parsed.embeddings)
    }
}

// ============ Vector helpers ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance (`1 − similarity`); smaller means more similar, matching
/// the ascending ordering of retrieval results.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - f64::from(cosine_similarity(a, b))
}
