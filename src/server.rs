//! HTTP surface consumed by the chat-widget UI.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from the indexed knowledge base |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Bad input returns `400 {"error": "..."}`; internal failures return
//! `500 {"error": "...", "details": "..."}`. Stack traces never reach the
//! wire.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser widget
//! can call the API cross-origin.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::AnswerEngine;
use crate::error::KbError;
use crate::models::GroundedAnswer;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<AnswerEngine>,
    default_top_k: i64,
}

/// Build the router. Split from [`run_server`] so tests can drive handlers
/// in-process.
pub fn create_router(engine: Arc<AnswerEngine>, default_top_k: i64) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            engine,
            default_top_k,
        })
}

/// Bind and serve until the process terminates.
pub async fn run_server(
    bind: &str,
    engine: Arc<AnswerEngine>,
    default_top_k: i64,
) -> anyhow::Result<()> {
    let app = create_router(engine, default_top_k);

    tracing::info!(bind, "knowledge agent listening");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Flat JSON error body: `{"error"}` for client errors,
/// `{"error", "details"}` for internal ones.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody {
            error: message.into(),
            details: None,
        },
    }
}

fn internal(err: KbError) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: "internal error".to_string(),
            details: Some(err.to_string()),
        },
    }
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::Validation(message) => bad_request(message),
            other => internal(other),
        }
    }
}

// ============ POST /ask ============

/// Handler for `POST /ask`.
///
/// The body is taken as raw JSON and validated by hand so a missing or
/// non-string `question` yields the documented 400 body rather than a
/// deserialization rejection.
async fn handle_ask(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<GroundedAnswer>, AppError> {
    let question = body
        .get("question")
        .and_then(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("Missing 'question' (string)"))?;

    let top_k = match body.get("topK") {
        None | Some(serde_json::Value::Null) => state.default_top_k,
        Some(value) => value
            .as_i64()
            .filter(|k| *k >= 1)
            .ok_or_else(|| bad_request("'topK' must be a positive integer"))?,
    };

    let result = state.engine.answer(question, top_k).await?;
    tracing::info!(top_k, sources = result.sources.len(), "ask completed");
    Ok(Json(result))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClient;
    use crate::llm::ChatClient;
    use crate::models::EmbeddedChunk;
    use crate::store::DocumentStore;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::json;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use tower::ServiceExt;

    struct StubEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub-model"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(KbError::Provider("embedding backend down".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct StubChat;

    #[async_trait]
    impl ChatClient for StubChat {
        async fn complete(&self, _system: &str, _user: &str) -> crate::error::Result<String> {
            Ok("Stub answer [#1].".to_string())
        }
    }

    async fn router_with(fail_embedder: bool, seed_chunk: bool) -> Router {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        let store = Arc::new(DocumentStore::new(pool));

        if seed_chunk {
            let doc = store
                .upsert_document("https://example.com/a", Some("Doc A"))
                .await
                .unwrap();
            store
                .replace_chunks(
                    &doc,
                    "stub-model",
                    &[EmbeddedChunk {
                        chunk_index: 0,
                        content: "Indexed passage.".to_string(),
                        embedding: vec![1.0, 0.0],
                        metadata: json!({}),
                    }],
                )
                .await
                .unwrap();
        }

        let engine = Arc::new(AnswerEngine::new(
            store,
            Arc::new(StubEmbedder {
                fail: fail_embedder,
            }),
            Arc::new(StubChat),
        ));
        create_router(engine, 6)
    }

    async fn post_ask(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn missing_question_is_400_with_documented_body() {
        let app = router_with(false, true).await;
        let (status, body) = post_ask(app, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing 'question' (string)" }));
    }

    #[tokio::test]
    async fn empty_question_is_400() {
        let app = router_with(false, true).await;
        let (status, body) = post_ask(app, json!({ "question": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing 'question' (string)" }));
    }

    #[tokio::test]
    async fn non_string_question_is_400() {
        let app = router_with(false, true).await;
        let (status, _) = post_ask(app, json!({ "question": 42 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_top_k_is_400() {
        let app = router_with(false, true).await;
        let (status, body) = post_ask(app, json!({ "question": "q", "topK": 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "'topK' must be a positive integer");
    }

    #[tokio::test]
    async fn answer_includes_ordered_sources() {
        let app = router_with(false, true).await;
        let (status, body) = post_ask(app, json!({ "question": "What is indexed?" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Stub answer [#1].");
        assert_eq!(body["sources"][0]["ref"], "#1");
        assert_eq!(body["sources"][0]["source"], "https://example.com/a");
        assert_eq!(body["sources"][0]["chunk_index"], 0);
    }

    #[tokio::test]
    async fn empty_store_still_answers_with_no_sources() {
        let app = router_with(false, false).await;
        let (status, body) = post_ask(app, json!({ "question": "Anything?" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sources"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_500_with_details() {
        let app = router_with(true, true).await;
        let (status, body) = post_ask(app, json!({ "question": "q" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal error");
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("embedding backend down"));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = router_with(false, false).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }
}
