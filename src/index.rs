//! Persistent vector index backed by SQLite.
//!
//! The index stores one row per chunk with its embedding serialized as a
//! little-endian f32 blob, plus a `documents` table recording a content hash
//! per source so re-training an unchanged file is a no-op. All writes go
//! through a single async lock; reads run concurrently against the pool.
//!
//! The index never panics and never surfaces errors to callers: a failed
//! open leaves it in [`IndexState::Degraded`], where `add` returns `false`
//! and `search` returns no hits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db;
use crate::deadline::run_with_deadline;
use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::migrate;
use crate::models::{Chunk, IndexStats, ScoredChunk, SourceInfo};

/// Operational state of the index.
///
/// `Degraded` means storage or the embedding provider could not be reached
/// at open time. The index stays usable in the sense that every call
/// returns a harmless value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Ready,
    Degraded,
}

pub struct VectorIndex {
    pool: Option<SqlitePool>,
    provider: Arc<dyn EmbeddingProvider>,
    state: IndexState,
    collection: String,
    batch_size: usize,
    batch_deadline: Duration,
    search_deadline: Duration,
    write_lock: Mutex<()>,
}

impl VectorIndex {
    /// Opens the index, probing storage and the embedding provider.
    ///
    /// This never fails: any problem is logged once and the index comes up
    /// `Degraded` instead.
    pub async fn open(config: &Config) -> Self {
        let provider = match embedding::create_provider(&config.embedding) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("embedding provider unavailable: {}", e);
                Arc::new(embedding::DisabledProvider)
            }
        };
        Self::open_with_provider(config, provider).await
    }

    /// Opens the index against an already-constructed provider.
    pub async fn open_with_provider(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let mut degraded: Option<String> = None;

        let pool = match db::connect(&config.storage.index_path).await {
            Ok(pool) => match migrate::run_index_migrations(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    degraded = Some(format!("index schema: {}", e));
                    None
                }
            },
            Err(e) => {
                degraded = Some(format!("index storage: {}", e));
                None
            }
        };

        if degraded.is_none() {
            if let Err(e) = provider.health_check().await {
                degraded = Some(e.to_string());
            }
        }

        let state = match degraded {
            None => {
                info!(
                    "vector index ready: collection {}, model {} ({} dims)",
                    config.storage.collection,
                    provider.model_name(),
                    provider.dims()
                );
                IndexState::Ready
            }
            Some(why) => {
                warn!("vector index degraded: {}", why);
                IndexState::Degraded
            }
        };

        Self {
            pool,
            provider,
            state,
            collection: config.storage.collection.clone(),
            batch_size: config.embedding.batch_size.max(1),
            batch_deadline: Duration::from_secs(config.embedding.timeout_secs),
            search_deadline: Duration::from_secs(config.limits.query_deadline_secs),
            write_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    // ============================================================
    // Writing
    // ============================================================

    /// Embeds and stores a set of chunks from one source, replacing any
    /// previously stored chunks for that source.
    ///
    /// Returns `true` only when every chunk was committed (or the source is
    /// unchanged since the last call). Blank chunks are dropped up front; an
    /// empty set after filtering is rejected. Batches are committed as they
    /// complete, so a mid-run failure leaves earlier batches in place with
    /// the source marked incomplete, and the next call for the same source
    /// starts over cleanly.
    pub async fn add(&self, chunks: &[Chunk]) -> bool {
        if self.state != IndexState::Ready {
            debug!("add skipped: index degraded");
            return false;
        }
        let Some(pool) = self.pool.clone() else {
            return false;
        };

        let chunks: Vec<Chunk> = chunks
            .iter()
            .filter(|c| !c.content.trim().is_empty())
            .cloned()
            .collect();
        if chunks.is_empty() {
            debug!("add skipped: no non-blank chunks");
            return false;
        }

        let source_name = chunks[0].source_name.clone();
        let content_hash = hash_chunks(&source_name, &chunks);

        let _guard = self.write_lock.lock().await;

        match self.stored_hash(&pool, &source_name).await {
            Ok(Some(stored)) if stored == content_hash => {
                info!("{} unchanged, skipping re-index", source_name);
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("hash lookup failed for {}: {}", source_name, e);
                return false;
            }
        }

        let total = chunks.len();
        let batches: Vec<&[Chunk]> = chunks.chunks(self.batch_size).collect();
        let last = batches.len() - 1;

        for (i, batch) in batches.into_iter().enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let provider = self.provider.clone();
            let embedded = run_with_deadline("batch embedding", self.batch_deadline, async move {
                provider.embed(&texts).await
            })
            .await;

            let vectors = match embedded {
                Ok(Ok(vectors)) => vectors,
                Ok(Err(e)) => {
                    warn!("embedding batch failed for {}: {}", source_name, e);
                    return false;
                }
                Err(e) => {
                    warn!("indexing {} abandoned: {}", source_name, e);
                    return false;
                }
            };
            if vectors.len() != batch.len() {
                warn!(
                    "embedding batch for {} returned {} vectors for {} chunks",
                    source_name,
                    vectors.len(),
                    batch.len()
                );
                return false;
            }

            let committed = self
                .commit_batch(
                    &pool,
                    batch,
                    &vectors,
                    &source_name,
                    &content_hash,
                    total as i64,
                    i == 0,
                    i == last,
                )
                .await;
            if let Err(e) = committed {
                warn!("batch commit failed for {}: {}", source_name, e);
                return false;
            }
        }

        info!("indexed {} chunks from {}", total, source_name);
        true
    }

    /// Commits one embedded batch. The first batch clears out any previous
    /// chunks for the source; the last records the document row, so the
    /// content hash only lands once every chunk is in.
    #[allow(clippy::too_many_arguments)]
    async fn commit_batch(
        &self,
        pool: &SqlitePool,
        batch: &[Chunk],
        vectors: &[Vec<f32>],
        source_name: &str,
        content_hash: &str,
        total_chunks: i64,
        is_first: bool,
        is_last: bool,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().timestamp();
        let mut tx = pool.begin().await?;

        if is_first {
            sqlx::query("DELETE FROM entries WHERE collection = ? AND source_name = ?")
                .bind(&self.collection)
                .bind(source_name)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM documents WHERE collection = ? AND source_name = ?")
                .bind(&self.collection)
                .bind(source_name)
                .execute(&mut *tx)
                .await?;
        }

        for (chunk, vector) in batch.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO entries
                    (id, collection, source_name, chunk_index, total_chunks,
                     content, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, source_name, chunk_index) DO UPDATE SET
                    id = excluded.id,
                    total_chunks = excluded.total_chunks,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&self.collection)
            .bind(&chunk.source_name)
            .bind(chunk.chunk_index)
            .bind(chunk.total_chunks)
            .bind(&chunk.content)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        if is_last {
            sqlx::query(
                r#"
                INSERT INTO documents
                    (collection, source_name, content_hash, chunk_count, extracted_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(collection, source_name) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    chunk_count = excluded.chunk_count,
                    extracted_at = excluded.extracted_at
                "#,
            )
            .bind(&self.collection)
            .bind(source_name)
            .bind(content_hash)
            .bind(total_chunks)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn stored_hash(
        &self,
        pool: &SqlitePool,
        source_name: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT content_hash FROM documents WHERE collection = ? AND source_name = ?",
        )
        .bind(&self.collection)
        .bind(source_name)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.get("content_hash")))
    }

    // ============================================================
    // Searching
    // ============================================================

    /// Returns up to `k` chunks ranked by cosine similarity to the query.
    ///
    /// Any failure, including running past the query deadline, yields an
    /// empty result rather than an error.
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        if self.state != IndexState::Ready {
            debug!("search skipped: index degraded");
            return Vec::new();
        }
        let Some(pool) = self.pool.clone() else {
            return Vec::new();
        };
        if query.trim().is_empty() || k == 0 {
            return Vec::new();
        }

        let provider = self.provider.clone();
        let collection = self.collection.clone();
        let query = query.to_string();
        let result = run_with_deadline("similarity search", self.search_deadline, async move {
            rank_chunks(&pool, provider, &collection, &query, k).await
        })
        .await;

        match result {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!("search failed: {}", e);
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }

    // ============================================================
    // Inspection
    // ============================================================

    /// Best-effort counts over the collection. Works off storage alone, so
    /// counts stay accurate even when the embedding provider is down; if
    /// storage itself is unavailable, everything reads as zero.
    pub async fn stats(&self) -> IndexStats {
        let Some(pool) = &self.pool else {
            return IndexStats::default();
        };

        let total_documents =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(pool)
                .await
                .unwrap_or_else(|e| {
                    debug!("document count failed: {}", e);
                    0
                });
        let total_chunks_estimate =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entries WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(pool)
                .await
                .unwrap_or_else(|e| {
                    debug!("chunk count failed: {}", e);
                    0
                });

        IndexStats {
            total_documents,
            total_chunks_estimate,
        }
    }

    /// Lists trained sources, newest first.
    pub async fn sources(&self) -> Vec<SourceInfo> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };

        let rows = sqlx::query(
            r#"
            SELECT source_name, chunk_count, extracted_at
            FROM documents
            WHERE collection = ?
            ORDER BY extracted_at DESC, source_name ASC
            "#,
        )
        .bind(&self.collection)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .map(|row| SourceInfo {
                    source_name: row.get("source_name"),
                    chunk_count: row.get("chunk_count"),
                    extracted_at: row.get("extracted_at"),
                })
                .collect(),
            Err(e) => {
                warn!("source listing failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Embeds the query and ranks every stored chunk against it.
///
/// The scan is linear over the collection. That holds up fine at the scale
/// this index is built for (hundreds of documents, a few thousand chunks).
async fn rank_chunks(
    pool: &SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
    collection: &str,
    query: &str,
    k: usize,
) -> crate::error::Result<Vec<ScoredChunk>> {
    let query_vec = embedding::embed_query(provider.as_ref(), query).await?;

    let rows = sqlx::query(
        "SELECT source_name, chunk_index, content, embedding FROM entries WHERE collection = ?",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<ScoredChunk> = Vec::with_capacity(rows.len());
    for row in &rows {
        let blob: Vec<u8> = row.get("embedding");
        let vector = blob_to_vec(&blob);
        let score = cosine_similarity(&query_vec, &vector);
        scored.push(ScoredChunk {
            content: row.get("content"),
            source_name: row.get("source_name"),
            chunk_index: row.get("chunk_index"),
            score,
        });
    }

    // Rank by score, then source and position so ties land deterministically.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source_name.cmp(&b.source_name))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(k);
    Ok(scored)
}

fn hash_chunks(source_name: &str, chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    for chunk in chunks {
        hasher.update(chunk.chunk_index.to_le_bytes());
        hasher.update(chunk.content.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
