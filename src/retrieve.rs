//! Query-time retrieval: embed the question, rank stored chunks.

use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::error::{KbError, Result};
use crate::models::RetrievedChunk;
use crate::store::DocumentStore;

/// Embeds a question and returns the top-K most similar stored chunks,
/// ordered by ascending distance. An empty store yields an empty result,
/// not an error.
pub struct Retriever {
    store: Arc<DocumentStore>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl Retriever {
    pub fn new(store: Arc<DocumentStore>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { store, embedder }
    }

    pub async fn retrieve(&self, question: &str, top_k: i64) -> Result<Vec<RetrievedChunk>> {
        if top_k < 1 {
            return Err(KbError::Validation("top-K must be >= 1".to_string()));
        }

        let vectors = self.embedder.embed(&[question.to_string()]).await?;
        let query = vectors.into_iter().next().ok_or_else(|| {
            KbError::Provider("embedding provider returned no vector for the query".to_string())
        })?;

        self.store
            .top_k_by_similarity(&query, self.embedder.model_name(), top_k)
            .await
    }
}
