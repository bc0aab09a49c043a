//! Ingestion pipeline orchestration.
//!
//! For each configured source: fetch readable text, gate on minimum length,
//! upsert the document row, chunk, embed in provider-sized batches, and
//! atomically replace the document's chunk set. Fetch and low-content
//! failures skip the source; provider or store failures fail the source;
//! the run always continues with the remaining sources and reports
//! per-source outcomes.

use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, IngestConfig};
use crate::embedding::EmbeddingClient;
use crate::error::{KbError, Result};
use crate::fetch::PageFetcher;
use crate::models::{EmbeddedChunk, IngestReport, SourceOutcome, SourceStatus};
use crate::store::DocumentStore;

/// Run the pipeline over the configured source list.
///
/// With `dry_run` set, sources are fetched and chunk counts computed but
/// nothing is written.
pub async fn run_ingest(
    store: &DocumentStore,
    fetcher: &dyn PageFetcher,
    embedder: &dyn EmbeddingClient,
    chunking: &ChunkingConfig,
    ingest: &IngestConfig,
    batch_size: usize,
    dry_run: bool,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for source in &ingest.sources {
        let status = match ingest_source(
            store,
            fetcher,
            embedder,
            chunking,
            ingest.min_chars,
            batch_size,
            source,
            dry_run,
        )
        .await
        {
            Ok(chunks) => {
                info!(source, chunks, dry_run, "source ingested");
                SourceStatus::Ingested { chunks }
            }
            Err(err @ (KbError::Fetch { .. } | KbError::LowContent { .. })) => {
                warn!(source, %err, "source skipped");
                SourceStatus::Skipped {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                warn!(source, %err, "source ingestion failed");
                SourceStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };

        report.outcomes.push(SourceOutcome {
            source: source.clone(),
            status,
        });
    }

    if !dry_run {
        // Planner statistics refresh; advisory only.
        if let Err(err) = store.analyze().await {
            warn!(%err, "post-ingest ANALYZE failed");
        }
    }

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn ingest_source(
    store: &DocumentStore,
    fetcher: &dyn PageFetcher,
    embedder: &dyn EmbeddingClient,
    chunking: &ChunkingConfig,
    min_chars: usize,
    batch_size: usize,
    source: &str,
    dry_run: bool,
) -> Result<usize> {
    let page = fetcher.fetch(source).await?;
    let text = page.text.trim();

    let chars = text.chars().count();
    if chars < min_chars {
        return Err(KbError::LowContent {
            url: source.to_string(),
            chars,
            min: min_chars,
        });
    }

    if dry_run {
        return Ok(chunk_text(text, chunking.max_chars, chunking.overlap_chars).len());
    }

    let doc_id = store.upsert_document(source, page.title.as_deref()).await?;

    let pieces = chunk_text(text, chunking.max_chars, chunking.overlap_chars);

    let mut vectors = Vec::with_capacity(pieces.len());
    for batch in pieces.chunks(batch_size) {
        vectors.extend(embedder.embed(batch).await?);
    }

    let chunks: Vec<EmbeddedChunk> = pieces
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (content, embedding))| EmbeddedChunk {
            chunk_index: index as i64,
            content,
            embedding,
            metadata: serde_json::json!({ "url": source }),
        })
        .collect();

    let count = chunks.len();
    store
        .replace_chunks(&doc_id, embedder.model_name(), &chunks)
        .await?;

    Ok(count)
}
