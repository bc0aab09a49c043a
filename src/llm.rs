//! Chat-completion provider abstraction for answer synthesis.
//!
//! Mirrors the embedding layer: a [`ChatClient`] trait with OpenAI-style
//! and Ollama-style HTTP implementations, selected by `llm.provider` in the
//! config. One request, one response, no streaming, no retries.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{KbError, Result};

/// A single-round-trip chat completion: system instruction + user message
/// in, free-text answer out.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the provider selected by `llm.provider` in the config.
pub fn create_chat(config: &LlmConfig) -> Result<Box<dyn ChatClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        other => Err(KbError::Provider(format!("unknown llm provider: {}", other))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| KbError::Provider(e.to_string()))
}

// ============ OpenAI-compatible provider ============

/// Chat provider for the OpenAI chat-completions API (or any compatible
/// endpoint via the `url` config override). Requires `OPENAI_API_KEY`.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
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
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| KbError::Provider(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KbError::Provider(format!(
                "chat API error {}: {}",
                status, body_text
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| KbError::Provider(format!("invalid chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| KbError::Provider("chat response has no choices".to_string()))
    }
}

// ============ Ollama provider ============

/// Chat provider for a local Ollama instance
/// (default `http://localhost:11434`).
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: config.model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl ChatClient for OllamaChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
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

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| KbError::Provider(format!("invalid Ollama response: {}", e)))?;

        Ok(parsed.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn ollama_config(url: &str) -> LlmConfig {
        LlmConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            url: Some(url.to_string()),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn ollama_chat_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "  Grounded answer. [#1]  " }
                }));
            })
            .await;

        let client = OllamaChat::new(&ollama_config(&server.base_url())).unwrap();
        let answer = client.complete("system", "user").await.unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Grounded answer. [#1]");
    }

    #[tokio::test]
    async fn ollama_chat_error_propagates_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(429).body("rate limited");
            })
            .await;

        let client = OllamaChat::new(&ollama_config(&server.base_url())).unwrap();
        let err = client.complete("system", "user").await.unwrap_err();

        mock.assert_hits_async(1).await;
        assert!(matches!(err, KbError::Provider(_)));
        assert!(err.to_string().contains("429"));
    }
}
