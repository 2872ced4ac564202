//! Read path: question → top-k chunks.

use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::SearchHit;

pub struct Retriever<'a> {
    index: &'a VectorIndex,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex) -> Self {
        Self { index }
    }

    /// Most similar chunks first, at most `k`. No re-ranking or deduplication.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchHit>> {
        let hits = self.index.search(question, k).await?;
        tracing::debug!(
            k,
            returned = hits.len(),
            best = hits.first().map(|h| h.score),
            "retrieved"
        );
        Ok(hits)
    }
}
