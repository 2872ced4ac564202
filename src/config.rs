//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_or_default`]) yields a working configuration: local
//! fastembed embeddings, a SQLite index under `./data`, and Ollama for
//! generation.
//!
//! ```toml
//! [paths]
//! documents_dir = "./data/documents"
//!
//! [index]
//! path = "./data/index.sqlite"
//! collection = "research_docs"
//!
//! [chunking]
//! chunk_size = 800
//! chunk_overlap = 160
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [llm]
//! provider = "ollama"
//! model = "llama2-uncensored:7b"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! Directories are never created while loading; call [`ensure_dirs`] from
//! the command that needs them.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub loader: LoaderConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Where uploaded originals are saved before ingestion.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/documents")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file holding every collection.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            collection: default_collection(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}
fn default_collection() -> String {
    "research_docs".to_string()
}

/// Character-window chunking policy.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    160
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `local`, `ollama`, `openai`, `hashing`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// One of `ollama`, `openai`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Ollama base URL, or the OpenAI-compatible API base (`.../v1`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "llama2-uncensored:7b".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Upper bound accepted from clients for `top_k`.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Length of the chunk prefix returned as a citation snippet.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    50
}
fn default_snippet_chars() -> usize {
    220
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    /// Maximum body size accepted when fetching a URL.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_loader_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            timeout_secs: default_loader_timeout_secs(),
        }
    }
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_loader_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Request body limit for `POST /ingest` uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields [`Config::default`].
/// A file that exists and fails to parse is still an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| RagError::config(format!("failed to parse config file: {}", e)))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        return Err(RagError::config("chunking.chunk_size must be > 0"));
    }
    if chunking.chunk_overlap >= chunking.chunk_size {
        return Err(RagError::config(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            chunking.chunk_overlap, chunking.chunk_size
        )));
    }

    if config.index.collection.trim().is_empty() {
        return Err(RagError::config("index.collection must not be empty"));
    }

    match config.embedding.provider.as_str() {
        "local" | "ollama" | "openai" | "hashing" => {}
        other => {
            return Err(RagError::config(format!(
                "unknown embedding provider: '{}'. Must be local, ollama, openai, or hashing.",
                other
            )))
        }
    }
    if config.embedding.dims == Some(0) {
        return Err(RagError::config("embedding.dims must be > 0"));
    }
    if config.embedding.batch_size == 0 {
        return Err(RagError::config("embedding.batch_size must be > 0"));
    }

    match config.llm.provider.as_str() {
        "ollama" | "openai" => {}
        other => {
            return Err(RagError::config(format!(
                "unknown llm provider: '{}'. Must be ollama or openai.",
                other
            )))
        }
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(RagError::config("llm.temperature must be in [0.0, 2.0]"));
    }

    let retrieval = &config.retrieval;
    if retrieval.default_top_k > retrieval.max_top_k {
        return Err(RagError::config(
            "retrieval.default_top_k must not exceed retrieval.max_top_k",
        ));
    }

    Ok(())
}

/// Create the documents directory and the index's parent directory.
pub fn ensure_dirs(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.paths.documents_dir)?;
    if let Some(parent) = config.index.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
