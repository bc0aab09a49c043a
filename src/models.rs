//! Core data types flowing through the ingestion and answering pipeline.

use serde::Serialize;

/// One ingested source (a URL) and its metadata.
///
/// `source` is globally unique; re-ingesting the same source bumps
/// `updated_at` on the existing row instead of creating a duplicate.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A chunk ready for storage: bounded text plus its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// 0-based position within the owning document.
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Open key-value map persisted as JSON (e.g. the originating URL).
    pub metadata: serde_json::Value,
}

/// A stored chunk joined with its document, ranked by similarity.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub source: String,
    pub title: Option<String>,
    pub chunk_index: i64,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Cosine distance to the query vector; smaller is more similar.
    pub distance: f64,
}

/// One entry of the citation list returned alongside an answer.
///
/// `sources[i]` corresponds 1:1 and in order to the `[#i+1]` reference tag
/// in the context block handed to the LLM, so callers can resolve inline
/// citation markers.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    #[serde(rename = "ref")]
    pub reference: String,
    pub source: String,
    pub title: Option<String>,
    pub chunk_index: i64,
    pub distance: f64,
}

/// A grounded answer with its ordered citation list.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Outcome of ingesting a single source.
#[derive(Debug, Clone)]
pub enum SourceStatus {
    Ingested { chunks: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

/// Per-source result recorded by an ingestion run.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestReport {
    pub fn ingested(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Ingested { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Failed { .. }))
            .count()
    }

    pub fn chunks_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                SourceStatus::Ingested { chunks } => chunks,
                _ => 0,
            })
            .sum()
    }
}
