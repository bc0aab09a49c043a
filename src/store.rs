//! Durable document/chunk persistence with similarity search.
//!
//! The store is the only writer of `documents` and `chunks`. Re-ingestion
//! replaces a document's chunk set inside one transaction
//! ([`DocumentStore::replace_chunks`]) so a concurrent reader never sees a
//! half-written set and an aborted run rolls back to the prior version.
//!
//! Similarity search decodes the stored embedding BLOBs and ranks by cosine
//! distance in Rust; with the corpus sizes this service targets a full scan
//! beats maintaining an ANN index.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::error::{KbError, Result};
use crate::models::{Document, EmbeddedChunk, RetrievedChunk};

pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document for `source`, or bump `updated_at` on the
    /// existing row. Returns the document id either way; idempotent by
    /// `source`.
    pub async fn upsert_document(&self, source: &str, title: Option<&str>) -> Result<String> {
        let existing_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE source = ?")
                .bind(source)
                .fetch_optional(&self.pool)
                .await
                .map_err(KbError::from_sqlx)?;

        let doc_id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (id, source, title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                title = excluded.title,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc_id)
        .bind(source)
        .bind(title)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(KbError::from_sqlx)?;

        Ok(doc_id)
    }

    /// Look up a document by its source key.
    pub async fn get_document(&self, source: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, source, title, created_at, updated_at FROM documents WHERE source = ?",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(KbError::from_sqlx)?;

        Ok(row.map(|r| Document {
            id: r.get("id"),
            source: r.get("source"),
            title: r.get("title"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Delete all chunks for a document. No-op when none exist.
    pub async fn clear_chunks(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(KbError::from_sqlx)?;
        Ok(())
    }

    /// Insert a single chunk row. A duplicate `(document_id, chunk_index)`
    /// or missing parent document surfaces as [`KbError::Constraint`];
    /// both indicate a pipeline logic bug.
    pub async fn insert_chunk(
        &self,
        document_id: &str,
        chunk_index: i64,
        content: &str,
        embedding: &[f32],
        model: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        insert_chunk_query(document_id, chunk_index, content, embedding, model, metadata)
            .execute(&self.pool)
            .await
            .map_err(KbError::from_sqlx)?;
        Ok(())
    }

    /// Atomically replace a document's chunk set: delete the old rows and
    /// insert the new ones inside one transaction.
    pub async fn replace_chunks(
        &self,
        document_id: &str,
        model: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(KbError::from_sqlx)?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(KbError::from_sqlx)?;

        for chunk in chunks {
            insert_chunk_query(
                document_id,
                chunk.chunk_index,
                &chunk.content,
                &chunk.embedding,
                model,
                &chunk.metadata,
            )
            .execute(&mut *tx)
            .await
            .map_err(KbError::from_sqlx)?;
        }

        tx.commit().await.map_err(KbError::from_sqlx)?;
        Ok(())
    }

    /// Return the `k` chunks closest to `query`, joined with their
    /// documents, ordered by ascending cosine distance with ties broken by
    /// chunk id. Refuses to rank when stored chunks were embedded by a
    /// model other than `model`.
    pub async fn top_k_by_similarity(
        &self,
        query: &[f32],
        model: &str,
        k: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        if k < 1 {
            return Err(KbError::Validation("top-K must be >= 1".to_string()));
        }

        let stored_models: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT model FROM chunks")
                .fetch_all(&self.pool)
                .await
                .map_err(KbError::from_sqlx)?;
        if let Some(other) = stored_models.iter().find(|m| m.as_str() != model) {
            return Err(KbError::ModelMismatch {
                stored: other.clone(),
                query: model.to_string(),
            });
        }

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding,
                   c.metadata_json, d.source, d.title
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(KbError::from_sqlx)?;

        let mut ranked: Vec<(String, RetrievedChunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let metadata_json: String = row.get("metadata_json");
                let metadata =
                    serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);
                let chunk = RetrievedChunk {
                    document_id: row.get("document_id"),
                    source: row.get("source"),
                    title: row.get("title"),
                    chunk_index: row.get("chunk_index"),
                    content: row.get("content"),
                    metadata,
                    distance: cosine_distance(query, &vector),
                };
                (row.get::<String, _>("id"), chunk)
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.1.distance
                .partial_cmp(&b.1.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k as usize);

        Ok(ranked.into_iter().map(|(_, chunk)| chunk).collect())
    }

    /// Delete a document; its chunks go with it via the cascade.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(KbError::from_sqlx)?;
        Ok(())
    }

    pub async fn document_count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(KbError::from_sqlx)
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(KbError::from_sqlx)
    }

    /// Chunk indices stored for a document, ascending. Used by ingest
    /// reporting and tests.
    pub async fn chunk_indices(&self, document_id: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT chunk_index FROM chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(KbError::from_sqlx)
    }

    /// Refresh query-planner statistics after a bulk ingestion. Advisory;
    /// failures are the caller's to log, not fatal.
    pub async fn analyze(&self) -> Result<()> {
        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .map_err(KbError::from_sqlx)?;
        Ok(())
    }
}

fn insert_chunk_query<'a>(
    document_id: &'a str,
    chunk_index: i64,
    content: &'a str,
    embedding: &[f32],
    model: &'a str,
    metadata: &serde_json::Value,
) -> sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>> {
    sqlx::query(
        r#"
        INSERT INTO chunks (id, document_id, chunk_index, content, embedding, model, metadata_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(document_id)
    .bind(chunk_index)
    .bind(content)
    .bind(vec_to_blob(embedding))
    .bind(model)
    .bind(metadata.to_string())
    .bind(Utc::now().timestamp())
}
