//! Error taxonomy for the ingestion and question-answering pipeline.
//!
//! Fetch and low-content failures are recovered per source inside the
//! ingestion loop; everything else propagates to the caller of the operation
//! in progress. No variant is retried automatically anywhere in this crate.

use thiserror::Error;

/// Errors produced by the knowledge-agent core.
#[derive(Debug, Error)]
pub enum KbError {
    /// Source unreachable or non-2xx response during ingestion.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Extracted text fell below the minimum viable length for ingestion.
    #[error("extracted text for {url} is too short ({chars} chars, minimum {min})")]
    LowContent { url: String, chars: usize, min: usize },

    /// Embedding or LLM provider call failed (network, auth, rate limit,
    /// malformed response).
    #[error("provider error: {0}")]
    Provider(String),

    /// Persistence-layer uniqueness or foreign-key violation. Indicates a
    /// logic bug (e.g. inserting chunks without clearing first) and is never
    /// swallowed.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Stored chunks were embedded by a different model than the one the
    /// querying client uses; ranking across models is meaningless.
    #[error("embedding model mismatch: store has '{stored}', query uses '{query}'")]
    ModelMismatch { stored: String, query: String },

    /// Malformed caller input (missing question, non-positive top-K).
    #[error("{0}")]
    Validation(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl KbError {
    /// Classify an `sqlx` error, surfacing unique/foreign-key violations as
    /// [`KbError::Constraint`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return KbError::Constraint(db.message().to_string());
                }
                _ => {}
            }
        }
        KbError::Db(err)
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
