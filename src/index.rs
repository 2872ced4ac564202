//! Persistent vector index on SQLite.
//!
//! A collection is a named set of records that all share one embedding
//! model and dimensionality, pinned in the `collections` table the first
//! time the collection is opened. Each record stores the chunk text, its
//! provenance, a SHA-256 of the text, and the vector as a little-endian f32
//! BLOB (see [`vec_to_blob`]).
//!
//! Search is brute-force cosine similarity computed in Rust over every
//! record of the collection. Results are ordered by score descending, ties
//! by insertion order, so identical queries against an unchanged index
//! always return identical result lists.
//!
//! Writes go through a single transaction per [`VectorIndex::add`] call:
//! a batch is either fully present or fully absent.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, create_embedder, vec_to_blob, Embedder};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{ChunkMetadata, SearchHit};

pub struct VectorIndex {
    pool: SqlitePool,
    collection: String,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

/// Summary returned by [`VectorIndex::stats`].
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub collection: String,
    pub model: String,
    pub dims: usize,
    pub records: i64,
    /// `(source, record count)`, sorted by source.
    pub sources: Vec<(String, i64)>,
}

impl VectorIndex {
    /// Connect, migrate, and bind to `[index].collection`.
    ///
    /// Creates the collection for `embedder` on first use. An existing
    /// collection built with another model or dimensionality is a
    /// configuration error.
    pub async fn open(config: &Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(&config.index.path).await?;
        migrate::run_migrations(&pool).await?;

        let collection = config.index.collection.clone();
        let model = embedder.model_name().to_string();
        let dims = embedder.dims();

        // Concurrent openers race on the insert; whichever row landed wins
        // and every opener checks itself against it.
        let created = sqlx::query(
            "INSERT OR IGNORE INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&collection)
        .bind(&model)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await?
        .rows_affected()
            > 0;
        if created {
            tracing::info!(collection = %collection, model = %model, dims, "created collection");
        }

        let row = sqlx::query("SELECT model, dims FROM collections WHERE name = ?")
            .bind(&collection)
            .fetch_one(&pool)
            .await?;
        let stored_model: String = row.get("model");
        let stored_dims: i64 = row.get("dims");
        if stored_model != model || stored_dims as usize != dims {
            return Err(RagError::config(format!(
                "collection '{}' was built with {} ({} dims), but the configured embedder is {} ({} dims)",
                collection, stored_model, stored_dims, model, dims
            )));
        }

        Ok(Self {
            pool,
            collection,
            embedder,
            batch_size: config.embedding.batch_size.max(1),
        })
    }

    /// Build the configured embedder and open the index with it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding).await?;
        Self::open(config, embedder).await
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Embed `texts` and append them as new records. Returns the number of
    /// records written.
    pub async fn add(&self, texts: &[String], metadatas: &[ChunkMetadata]) -> Result<usize> {
        if texts.len() != metadatas.len() {
            return Err(RagError::validation(format!(
                "got {} texts but {} metadata entries",
                texts.len(),
                metadatas.len()
            )));
        }
        if texts.is_empty() {
            return Ok(0);
        }

        // Embed everything before opening the transaction
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embedder.embed(batch).await?);
        }
        let dims = self.embedder.dims();
        if vectors.len() != texts.len() || vectors.iter().any(|v| v.len() != dims) {
            return Err(RagError::Embedding(format!(
                "embedder returned vectors that do not match {} × {} dims",
                texts.len(),
                dims
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for ((text, meta), vector) in texts.iter().zip(metadatas).zip(&vectors) {
            sqlx::query(
                r#"
                INSERT INTO records (id, collection, text, source, page, title, hash, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&self.collection)
            .bind(text)
            .bind(&meta.source)
            .bind(meta.page.map(i64::from))
            .bind(&meta.title)
            .bind(hash_text(text))
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(collection = %self.collection, records = texts.len(), "added records");
        Ok(texts.len())
    }

    /// The `k` records most similar to `query`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, text, source, page, title, embedding
            FROM records
            WHERE collection = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let page: Option<i64> = row.get("page");
                SearchHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        page: page.and_then(|p| u32::try_from(p).ok()),
                        title: row.get("title"),
                    },
                    score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn persist(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let rows = sqlx::query(
            r#"
            SELECT source, COUNT(*) AS n
            FROM records
            WHERE collection = ?
            GROUP BY source
            ORDER BY source
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let sources: Vec<(String, i64)> = rows
            .iter()
            .map(|row| (row.get("source"), row.get("n")))
            .collect();

        Ok(IndexStats {
            collection: self.collection.clone(),
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            records: sources.iter().map(|(_, n)| n).sum(),
            sources,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
