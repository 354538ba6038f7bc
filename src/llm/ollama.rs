//! Ollama API client
//!
//! Implements the reasoning interface over `POST /api/generate` (streamed
//! NDJSON, accumulated into a single completion) and exposes the embeddings
//! endpoint used by the vector store.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::errors::{RagError, Result};
use crate::llm::parser::StreamDecoder;
use crate::llm::retry::RetryManager;
use crate::llm::{CompletionOptions, ReasoningBackend};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Transport-level ceiling; the workflow applies its own per-call timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Ollama HTTP client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    retry: RetryManager,
}

impl OllamaClient {
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL)
    }

    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            retry: RetryManager::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryManager) -> Self {
        self.retry = retry;
        self
    }

    /// Open a streamed generation
    pub async fn generate_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<impl futures_util::Stream<Item = Result<Vec<u8>>>> {
        let url = format!("{}/api/generate", self.base_url);
        let model = if options.model.is_empty() {
            self.model.clone()
        } else {
            options.model.clone()
        };

        let request = GenerateRequest {
            model,
            prompt: prompt.to_string(),
            stream: true,
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(RagError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Backend(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let stream = response.bytes_stream().map(|result| {
            result
                .map(|bytes| bytes.to_vec())
                .map_err(|e| RagError::StreamDecode(e.to_string()))
        });

        Ok(stream)
    }

    /// Run one generation to completion
    async fn generate(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let stream = self.generate_stream(prompt, options).await?;
        futures_util::pin_mut!(stream);

        let mut decoder = StreamDecoder::new();
        let mut text = String::new();
        let mut finished = false;

        while let Some(bytes) = stream.next().await {
            for chunk in decoder.push(&bytes?)? {
                text.push_str(&chunk.response);
                finished |= chunk.done;
            }
            if finished {
                break;
            }
        }

        if !finished && !decoder.is_drained() {
            return Err(RagError::StreamDecode("Stream ended mid-chunk".to_string()));
        }
        Ok(text)
    }

    /// Embed text with the given embedding model
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };

        self.retry
            .execute_with_retry(|| async {
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(RagError::Http)?;

                if !response.status().is_success() {
                    return Err(RagError::Backend(format!(
                        "HTTP {}: embedding request rejected",
                        response.status().as_u16()
                    )));
                }

                let body: EmbeddingResponse = response.json().await.map_err(RagError::Http)?;
                if body.embedding.is_empty() {
                    return Err(RagError::Backend(format!(
                        "Model {} returned an empty embedding",
                        model
                    )));
                }
                Ok(body.embedding)
            })
            .await
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// List installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RagError::Backend(format!("Failed to list models: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Backend("Failed to retrieve model list".to_string()));
        }

        let models_response: ModelsResponse = response
            .json()
            .await
            .map_err(|e| RagError::Backend(format!("Failed to parse models: {}", e)))?;

        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ReasoningBackend for OllamaClient {
    #[instrument(skip(self, prompt), fields(model = %options.model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let text = self
            .retry
            .execute_with_retry(|| self.generate(prompt, options))
            .await?;
        debug!(chars = text.len(), "completion received");
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new().unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_config("http://localhost:11434/", "llama3:8b").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model(), "llama3:8b");
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "m".to_string(),
            prompt: "p".to_string(),
            stream: true,
            options: GenerateOptions {
                temperature: 0.0,
                num_predict: 64,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["num_predict"], 64);
        assert_eq!(json["stream"], true);
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails() {
        let client = OllamaClient::with_config("http://127.0.0.1:9", DEFAULT_MODEL)
            .unwrap()
            .with_retry(RetryManager::disabled());
        let result = client.complete("hi", &CompletionOptions::default()).await;
        assert!(result.is_err());
        assert!(!client.health_check().await.unwrap());
    }
}
