//! HTTP embedding backends: Ollama and OpenAI.
//!
//! Both share the same retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5), up to `max_retries` extra attempts

use async_trait::async_trait;
use std::time::Duration;

use super::{check_vectors, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

// ============ Ollama ============

/// Calls `POST {url}/api/embed` on a running Ollama instance.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::config("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| RagError::config("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "Ollama").await?;
        let vectors = parse_vectors(json.get("embeddings"), None)?;
        check_vectors(vectors, texts.len(), self.dims)
    }
}

// ============ OpenAI ============

/// Calls the OpenAI embeddings API. Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let dims = match (config.dims, model.as_str()) {
            (Some(d), _) => d,
            (None, "text-embedding-3-small") | (None, "text-embedding-ada-002") => 1536,
            (None, "text-embedding-3-large") => 3072,
            (None, _) => {
                return Err(RagError::config(format!(
                    "embedding.dims required for OpenAI model '{}'",
                    model
                )))
            }
        };
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::config("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            client: http_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "OpenAI").await?;
        let vectors = parse_vectors(json.get("data"), Some("embedding"))?;
        check_vectors(vectors, texts.len(), self.dims)
    }
}

// ============ Shared plumbing ============

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    backend: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(backend, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let Some(req) = request.try_clone() else {
            return Err(RagError::Embedding(format!(
                "{} request body is not cloneable",
                backend
            )));
        };

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json().await.map_err(|e| {
                        RagError::Embedding(format!("invalid {} response: {}", backend, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = RagError::Embedding(format!(
                    "{} API error {}: {}",
                    backend, status, body_text
                ));
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(RagError::Embedding(format!(
                    "{} connection error: {}",
                    backend, e
                )));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| RagError::Embedding(format!("{} embedding failed", backend))))
}

/// Pull `[[f32]]` out of a response array. With `field`, each item is an
/// object holding the vector under that key (OpenAI's `data[].embedding`).
fn parse_vectors(array: Option<&serde_json::Value>, field: Option<&str>) -> Result<Vec<Vec<f32>>> {
    let items = array
        .and_then(|a| a.as_array())
        .ok_or_else(|| RagError::Embedding("response is missing the vector array".to_string()))?;

    items
        .iter()
        .map(|item| -> Result<Vec<f32>> {
            let vector = match field {
                Some(f) => item.get(f),
                None => Some(item),
            };
            vector
                .and_then(|v| v.as_array())
                .ok_or_else(|| RagError::Embedding("embedding is not an array".to_string()))?
                .iter()
                .map(|x| {
                    x.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| RagError::Embedding("non-numeric embedding value".to_string()))
                })
                .collect()
        })
        .collect()
}
