//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and selects a backend from
//! `[embedding].provider`:
//!
//! | Config Value | Provider |
//! |-------------|----------|
//! | `"local"` | [`LocalEmbedder`](local::LocalEmbedder): fastembed ONNX, offline after first download |
//! | `"ollama"` | [`OllamaEmbedder`](remote::OllamaEmbedder): `POST /api/embed` |
//! | `"openai"` | [`OpenAIEmbedder`](remote::OpenAIEmbedder): `POST /v1/embeddings` |
//! | `"hashing"` | [`HashingEmbedder`](hashing::HashingEmbedder): feature hashing, no model |
//!
//! Also provides the vector utilities used by the index:
//! - [`cosine_similarity`]
//! - [`vec_to_blob`] / [`blob_to_vec`] for SQLite BLOB storage
//!
//! Every provider is deterministic for a fixed configuration, and a provider
//! that cannot be built fails at [`create_embedder`] with
//! [`RagError::Config`] instead of producing placeholder vectors later.

pub mod hashing;
#[cfg(feature = "local-embeddings-fastembed")]
pub mod local;
pub mod remote;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// A text → vector backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier stored with the collection (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dims(&self) -> usize;

    /// Embed a batch of texts; one vector per input, same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("empty embedding response".to_string()))
    }
}

/// Build the configured [`Embedder`].
///
/// Async because the local provider loads its ONNX model here, on a blocking
/// thread, so that a bad model name fails before any document is touched.
pub async fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(hashing::HashingEmbedder::new(config))),
        "ollama" => Ok(Box::new(remote::OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(remote::OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(local::LocalEmbedder::load(config).await?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::config(
            "local embedding provider requires --features local-embeddings-fastembed",
        )),
        other => Err(RagError::config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Check that a backend answered with one vector of the right length per input.
pub(crate) fn check_vectors(
    vectors: Vec<Vec<f32>>,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::Embedding(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(RagError::Embedding(format!(
            "expected {}-dimensional vectors, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(vectors)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use research_assistant::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero, or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_check_vectors_rejects_wrong_shape() {
        assert!(check_vectors(vec![vec![0.0; 3]], 2, 3).is_err());
        assert!(check_vectors(vec![vec![0.0; 3], vec![0.0; 4]], 2, 3).is_err());
        assert!(check_vectors(vec![vec![0.0; 3], vec![0.0; 3]], 2, 3).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_config_error() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..Default::default()
        };
        let err = create_embedder(&config).await.err().unwrap();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[tokio::test]
    async fn test_embed_query_uses_batch_path() {
        let config = EmbeddingConfig {
            provider: "hashing".to_string(),
            dims: Some(32),
            ..Default::default()
        };
        let embedder = create_embedder(&config).await.unwrap();
        let single = embedder.embed_query("vector search").await.unwrap();
        let batch = embedder
            .embed(&["vector search".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
        assert_eq!(single.len(), 32);
    }
}
