//! Grounded answer synthesis.
//!
//! Builds a numbered context block from retrieved chunks, instructs the LLM
//! to answer only from that context with inline `[#N]` citations, and
//! returns the answer together with a source list that maps 1:1 and in
//! order to the reference tags, so callers can resolve citation markers.

use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::error::{KbError, Result};
use crate::llm::ChatClient;
use crate::models::{GroundedAnswer, RetrievedChunk, SourceRef};
use crate::retrieve::Retriever;
use crate::store::DocumentStore;

const SYSTEM_PROMPT: &str = "You answer questions using ONLY the supplied context. \
Cite the context passages you used inline with their reference tags, e.g. [#1]. \
If the context is insufficient to answer, say so plainly instead of guessing.";

const NO_CONTEXT_ANSWER: &str =
    "I don't have any indexed content to answer that question from.";

/// One retrieval round trip plus one LLM round trip per call. No caching,
/// no internal state.
pub struct AnswerEngine {
    retriever: Retriever,
    chat: Arc<dyn ChatClient>,
}

impl AnswerEngine {
    pub fn new(
        store: Arc<DocumentStore>,
        embedder: Arc<dyn EmbeddingClient>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            retriever: Retriever::new(store, embedder),
            chat,
        }
    }

    pub async fn answer(&self, question: &str, top_k: i64) -> Result<GroundedAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(KbError::Validation("Missing 'question' (string)".to_string()));
        }

        let chunks = self.retriever.retrieve(question, top_k).await?;
        if chunks.is_empty() {
            return Ok(GroundedAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = build_context(&chunks);
        let user = format!("Question: {}\n\nContext:\n{}", question, context);
        let answer = self.chat.complete(SYSTEM_PROMPT, &user).await?;

        let sources = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| SourceRef {
                reference: format!("#{}", i + 1),
                source: chunk.source.clone(),
                title: chunk.title.clone(),
                chunk_index: chunk.chunk_index,
                distance: chunk.distance,
            })
            .collect();

        Ok(GroundedAnswer { answer, sources })
    }
}

fn build_context(chunks: &[RetrievedChunk]) -> String {
    let mut block = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        block.push_str(&format!("[#{}] ({})\n{}\n\n", i + 1, chunk.source, chunk.content));
    }
    block
}
