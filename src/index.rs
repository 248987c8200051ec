//! SQLite-backed vector index.
//!
//! One row per chunk in `chunks`, one vector per chunk in `chunk_vectors`
//! (little-endian f32 BLOB). Search loads the vectors for the active model
//! and ranks them by cosine similarity in Rust.
//!
//! A document is always replaced as a whole: [`VectorIndex::upsert`] embeds
//! first, then deletes and re-inserts every row for the filename inside one
//! transaction. Readers see either the old version or the new one.

use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider};
use crate::error::Result;
use crate::migrate;
use crate::models::{Chunk, ChunkFailure, ChunkMetadata, DocumentSummary, ElementType, SearchHit};

/// Outcome of one [`VectorIndex::upsert`].
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub stored: usize,
    pub failed: Vec<ChunkFailure>,
}

pub struct VectorIndex {
    pool: SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

/// Text sent to the embedder for a chunk. Structured chunks are prefixed
/// with their kind so questions like "what is in the table?" can match.
fn embedding_input(chunk: &Chunk) -> String {
    match chunk.source_metadata.element_type {
        ElementType::Table => format!("table: {}", chunk.text),
        ElementType::Chart => format!("chart figure: {}", chunk.text),
        _ => chunk.text.clone(),
    }
}

impl VectorIndex {
    /// Wrap an open pool, creating tables if needed.
    pub async fn new(
        pool: SqlitePool,
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            provider,
            batch_size: batch_size.max(1),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed chunks in batches. A failed batch is retried one chunk at a
    /// time so a single bad chunk does not sink its neighbours.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> (Vec<Option<Vec<f32>>>, Vec<ChunkFailure>) {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        let mut failed = Vec::new();

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let base = batch_no * self.batch_size;
            let inputs: Vec<String> = batch.iter().map(embedding_input).collect();
            match self.provider.embed(&inputs).await {
                Ok(batch_vectors) if batch_vectors.len() == batch.len() => {
                    for (i, v) in batch_vectors.into_iter().enumerate() {
                        vectors[base + i] = Some(v);
                    }
                }
                result => {
                    let reason = match result {
                        Err(e) => e.to_string(),
                        Ok(v) => format!("expected {} embeddings, got {}", batch.len(), v.len()),
                    };
                    tracing::warn!(error = %reason, size = batch.len(), "batch embedding failed, retrying per chunk");
                    for (i, (chunk, input)) in batch.iter().zip(inputs).enumerate() {
                        match self.provider.embed(std::slice::from_ref(&input)).await {
                            Ok(mut v) if v.len() == 1 => vectors[base + i] = v.pop(),
                            Ok(v) => failed.push(ChunkFailure {
                                chunk_id: chunk.chunk_id.clone(),
                                error: format!("expected 1 embedding, got {}", v.len()),
                            }),
                            Err(e) => {
                                tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "chunk embedding failed");
                                failed.push(ChunkFailure {
                                    chunk_id: chunk.chunk_id.clone(),
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        (vectors, failed)
    }

    /// Replace every stored chunk of `filename` with `chunks`.
    ///
    /// Chunks that cannot be embedded are reported in
    /// [`UpsertReport::failed`] and left out. When every chunk fails the
    /// index is not touched and the previous version stays searchable.
    pub async fn upsert(&self, filename: &str, chunks: &[Chunk]) -> Result<UpsertReport> {
        let (vectors, failed) = self.embed_chunks(chunks).await;
        if !chunks.is_empty() && failed.len() == chunks.len() {
            return Ok(UpsertReport { stored: 0, failed });
        }

        let model = self.provider.model_name().to_string();
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?;

        let mut stored = 0;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let Some(vector) = vector else {
                continue;
            };
            let meta = &chunk.source_metadata;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, filename, chunk_offset, page, element_type, element_index, text, hash, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.chunk_id)
            .bind(filename)
            .bind(chunk.chunk_offset as i64)
            .bind(meta.page.map(|p| p as i64))
            .bind(meta.element_type.as_str())
            .bind(meta.element_index as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, filename, model, dims, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.chunk_id)
            .bind(filename)
            .bind(&model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(&vector))
            .execute(&mut *tx)
            .await?;
            stored += 1;
        }

        tx.commit().await?;
        tracing::debug!(filename, stored, failed = failed.len(), "upserted document");
        Ok(UpsertReport { stored, failed })
    }

    /// Rank stored chunks against `query`.
    ///
    /// Keeps hits with similarity `>= min_similarity`, ordered by
    /// descending similarity then ascending chunk id, at most `top_k`.
    /// An empty collection returns no hits without calling the embedder.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 || self.count_chunks().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.provider.as_ref(), query).await?;

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.filename, c.page, c.element_type, c.element_index, c.text, v.embedding
            FROM chunk_vectors v
            JOIN chunks c ON c.id = v.chunk_id
            WHERE v.model = ? AND v.dims = ?
            "#,
        )
        .bind(self.provider.model_name())
        .bind(query_vec.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                if similarity < min_similarity {
                    return None;
                }
                let page: Option<i64> = row.get("page");
                let element_type: String = row.get("element_type");
                let element_index: i64 = row.get("element_index");
                Some(SearchHit {
                    chunk_id: row.get("id"),
                    text: row.get("text"),
                    similarity,
                    metadata: ChunkMetadata {
                        filename: row.get("filename"),
                        page: page.map(|p| p as u32),
                        element_type: ElementType::parse(&element_type),
                        element_index: element_index as u32,
                    },
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    pub async fn count_documents(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT filename) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Delete everything.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete one document. Returns the number of chunks removed.
    pub async fn remove_document(&self, filename: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM chunks WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT filename,
                   COUNT(*) AS chunks,
                   COUNT(DISTINCT page) AS pages,
                   MAX(indexed_at) AS indexed_at
            FROM chunks
            GROUP BY filename
            ORDER BY filename
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentSummary {
                filename: row.get("filename"),
                chunks: row.get("chunks"),
                pages: row.get("pages"),
                indexed_at: row.get("indexed_at"),
            })
            .collect())
    }

    /// Chunk ids stored for `filename`, sorted.
    pub async fn chunk_ids(&self, filename: &str) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM chunks WHERE filename = ? ORDER BY id")
                .bind(filename)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}
