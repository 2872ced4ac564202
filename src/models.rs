//! Core data models used throughout the research assistant.
//!
//! These types represent the documents, chunks, retrieval hits, and answers
//! that flow through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize};

/// A loaded source, split into pages. Ephemeral: exists only during ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    /// File path or URL the content came from.
    pub source: String,
    pub title: Option<String>,
    pub pages: Vec<Page>,
}

/// One page of a [`Document`]. `number` is the 0-based page index, only set for
/// paginated sources (PDF).
#[derive(Debug, Clone)]
pub struct Page {
    pub number: Option<u32>,
    pub text: String,
}

/// Provenance attached to every chunk and indexed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            source: source.into(),
            page,
            title: None,
        }
    }
}

/// A contiguous window of a page's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A record returned from the vector index, most similar first.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Structured provenance returned next to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Always `null`; reserved for a future calibrated score.
    pub confidence: Option<f32>,
}
