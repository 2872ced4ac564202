//! Ingestion pipeline orchestration.
//!
//! Coordinates the write path for each source: loader → chunker →
//! embedder → vector index → persist. Sources are processed one at a
//! time and in isolation: a source that fails to load, chunk, or embed is
//! recorded in the [`IngestReport`] and leaves the index untouched, while
//! the rest of the batch carries on.

use serde::Serialize;
use std::path::PathBuf;

use crate::chunk::chunk_document;
use crate::config::{ensure_dirs, Config};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::loader;
use crate::models::{ChunkMetadata, Document};

/// Outcome of a multi-source ingest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Sources that were fully written (including those with zero chunks).
    pub ingested: Vec<String>,
    pub failed: Vec<IngestFailure>,
    /// Total records written across all ingested sources.
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of a single-source ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub source: String,
    pub chunks: usize,
}

/// Ingest PDF files. Only configuration problems (embedder or index cannot
/// be opened) fail the whole call; per-file errors go into the report.
pub async fn ingest_pdfs(config: &Config, paths: &[PathBuf]) -> Result<IngestReport> {
    ensure_dirs(config)?;
    let index = VectorIndex::from_config(config).await?;
    let mut report = IngestReport::default();

    for path in paths {
        let source = path.display().to_string();
        let result = match loader::load_pdf(path).await {
            Ok(document) => index_document(&index, config, &document).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(n) => {
                tracing::info!(source = %source, chunks = n, "ingested");
                report.ingested.push(source);
                report.chunks += n;
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "ingest failed");
                report.failed.push(IngestFailure {
                    source,
                    error: e.to_string(),
                });
            }
        }
    }

    index.close().await;
    Ok(report)
}

/// Fetch and ingest one web page.
pub async fn ingest_url(config: &Config, url: &str) -> Result<IngestOutcome> {
    loader::validate_url(url)?;
    ensure_dirs(config)?;
    let index = VectorIndex::from_config(config).await?;

    let result = match loader::load_url(url, &config.loader).await {
        Ok(document) => index_document(&index, config, &document).await,
        Err(e) => Err(e),
    };
    index.close().await;

    match result {
        Ok(chunks) => {
            tracing::info!(source = %url, chunks, "ingested");
            Ok(IngestOutcome {
                source: url.to_string(),
                chunks,
            })
        }
        Err(e) => {
            tracing::warn!(source = %url, error = %e, "ingest failed");
            Err(e)
        }
    }
}

/// Chunk a loaded document and write it as one batch.
pub async fn index_document(index: &VectorIndex, config: &Config, document: &Document) -> Result<usize> {
    let chunks = chunk_document(
        document,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    if chunks.is_empty() {
        return Ok(0);
    }

    let (texts, metadatas): (Vec<String>, Vec<ChunkMetadata>) =
        chunks.into_iter().map(|c| (c.text, c.metadata)).unzip();

    let written = index.add(&texts, &metadatas).await?;
    index.persist().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::pdf_fixture::pdf_with_pages;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.documents_dir = tmp.path().join("docs");
        config.index.path = tmp.path().join("index.sqlite");
        config.embedding = EmbeddingConfig {
            provider: "hashing".to_string(),
            dims: Some(64),
            ..Default::default()
        };
        config
    }

    async fn count(config: &Config) -> i64 {
        let index = VectorIndex::from_config(config).await.unwrap();
        let n = index.count().await.unwrap();
        index.close().await;
        n
    }

    #[tokio::test]
    async fn test_failed_source_does_not_block_batch() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        let good = tmp.path().join("good.pdf");
        std::fs::write(&good, pdf_with_pages(&["alpha", "beta"])).unwrap();
        let broken = tmp.path().join("broken.pdf");
        std::fs::write(&broken, b"%PDF-1.4 truncated").unwrap();
        let missing = tmp.path().join("missing.pdf");

        let report = ingest_pdfs(&config, &[broken.clone(), good.clone(), missing.clone()])
            .await
            .unwrap();

        assert_eq!(report.ingested, vec![good.display().to_string()]);
        assert_eq!(report.chunks, 2);
        let failed: Vec<_> = report.failed.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(
            failed,
            vec![broken.display().to_string(), missing.display().to_string()]
        );
        assert_eq!(count(&config).await, 2);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_count_unchanged() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        let first = tmp.path().join("first.pdf");
        std::fs::write(&first, pdf_with_pages(&["some indexed text"])).unwrap();
        ingest_pdfs(&config, &[first]).await.unwrap();
        let before = count(&config).await;

        let report = ingest_pdfs(&config, &[tmp.path().join("nope.pdf")])
            .await
            .unwrap();
        assert!(report.ingested.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(count(&config).await, before);
    }

    #[tokio::test]
    async fn test_unreachable_url_leaves_count_unchanged() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let before = count(&config).await;

        let err = ingest_url(&config, "http://127.0.0.1:9/missing")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "source_fetch");
        assert_eq!(count(&config).await, before);
    }

    #[tokio::test]
    async fn test_blank_document_ingests_zero_chunks() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let index = VectorIndex::from_config(&config).await.unwrap();
        let doc = Document {
            source: "blank.pdf".to_string(),
            title: None,
            pages: vec![crate::models::Page {
                number: Some(0),
                text: "  \n\n ".to_string(),
            }],
        };
        assert_eq!(index_document(&index, &config, &doc).await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
