//! Chat-completion backends used to write answers.
//!
//! | `[llm].provider` | Endpoint |
//! |------------------|----------|
//! | `"ollama"` | `POST {url}/api/chat` with `stream: false` (default `http://localhost:11434`) |
//! | `"openai"` | `POST {url}/chat/completions` (default `https://api.openai.com/v1`) |
//!
//! Every call is a single non-streaming turn. There is no retry: a failed
//! or timed-out call surfaces as [`RagError::Generation`].

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// A system instruction plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run one completion and return the assistant's text.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Build the configured [`LanguageModel`].
pub fn create_language_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        other => Err(RagError::config(format!("unknown llm provider: {}", other))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))
}

fn messages(prompt: &Prompt) -> serde_json::Value {
    json!([
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
    ])
}

/// POST a JSON body and return the decoded JSON response, mapping every
/// failure to a generation error.
async fn post_json(
    request: reqwest::RequestBuilder,
    backend: &str,
) -> Result<serde_json::Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            RagError::Generation(format!("{} request timed out", backend))
        } else {
            RagError::Generation(format!("{} connection error: {}", backend, e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RagError::Generation(format!(
            "{} API error {}: {}",
            backend, status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RagError::Generation(format!("invalid {} response: {}", backend, e)))
}

// ============ Ollama ============

pub struct OllamaChat {
    model: String,
    url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Ok(Self {
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages(prompt),
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let request = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body);

        let json = post_json(request, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::Generation("Ollama response has no message.content".to_string()))
}

// ============ OpenAI-compatible ============

pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// `OPENAI_API_KEY` is required for the public API. Self-hosted
    /// compatible servers configured through `[llm].url` may run without it.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if config.url.is_none() && api_key.is_none() {
            return Err(RagError::config(
                "OPENAI_API_KEY environment variable not set",
            ));
        }
        let url = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            model: config.model.clone(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages(prompt),
            "temperature": self.temperature,
        });
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let json = post_json(request, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::Generation("OpenAI response has no choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollama() {
        let body = json!({ "model": "m", "message": { "role": "assistant", "content": "Paris." }, "done": true });
        assert_eq!(parse_ollama_response(&body).unwrap(), "Paris.");
        assert!(matches!(
            parse_ollama_response(&json!({ "error": "model not found" })),
            Err(RagError::Generation(_))
        ));
    }

    #[test]
    fn test_parse_openai() {
        let body = json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": "42" } }] });
        assert_eq!(parse_openai_response(&body).unwrap(), "42");
        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_messages_order() {
        let prompt = Prompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let m = messages(&prompt);
        assert_eq!(m[0]["role"], "system");
        assert_eq!(m[1]["content"], "usr");
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_language_model(&config).err().unwrap(),
            RagError::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_ollama_is_generation_error() {
        let config = LlmConfig {
            url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        let model = create_language_model(&config).unwrap();
        let prompt = Prompt {
            system: String::new(),
            user: "hi".to_string(),
        };
        let err = model.generate(&prompt).await.unwrap_err();
        assert_eq!(err.code(), "generation");
    }
}
