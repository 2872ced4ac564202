//! Feature-hashing embedder.
//!
//! Lowercased alphanumeric tokens are hashed with SHA-256 into `dims`
//! signed buckets and the result is L2-normalized. Texts that share words
//! land close together under cosine similarity. No model, no network, and
//! bit-identical output for identical input, which makes it the provider
//! for offline setups and the test suite.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::Result;

const DEFAULT_DIMS: usize = 256;

pub struct HashingEmbedder {
    model: String,
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let dims = config.dims.unwrap_or(DEFAULT_DIMS);
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| format!("hashing-{}", dims)),
            dims,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut idx = [0u8; 8];
            idx.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(idx) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
