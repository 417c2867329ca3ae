use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::content_hash;
use crate::embedder::TextEmbedder;
use crate::MAX_EMBED_BATCH;

/// The item fields vectorization needs.
#[derive(Debug, Clone)]
pub struct VectorizeItem {
    pub id: Uuid,
    pub text: String,
    pub author_handle: String,
    pub hashtags: Vec<String>,
    pub has_vector: bool,
}

/// Outcome of one `ensure_embeddings` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VectorizeReport {
    pub total: usize,
    pub already_vectorized: usize,
    pub newly_vectorized: usize,
    pub failed: usize,
    pub cache_hit_rate: f64,
}

/// Store seam for vectorization; implemented over Postgres below, mocked
/// in-memory under test.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn items_for_vectorize(&self, ids: &[Uuid]) -> Result<Vec<VectorizeItem>>;
    async fn cached_vectors(&self, hashes: &[String]) -> Result<HashMap<String, Vec<f32>>>;
    async fn store_cache_entry(&self, hash: &str, vector: &[f32], model_id: &str) -> Result<()>;
    async fn set_item_vector(&self, item_id: Uuid, vector: &[f32]) -> Result<()>;
}

/// Ensure every listed item carries an embedding.
///
/// Cache hits copy the stored vector onto the item; misses are embedded in
/// batches and inserted into the cache. Failures are per item and never
/// abort the batch. Repeated calls on vectorized items are no-ops.
pub async fn ensure_embeddings<S: VectorStore + ?Sized, E: TextEmbedder + ?Sized>(
    store: &S,
    embedder: &E,
    item_ids: &[Uuid],
) -> Result<VectorizeReport> {
    let mut report = VectorizeReport {
        total: item_ids.len(),
        ..Default::default()
    };

    let items = store.items_for_vectorize(item_ids).await?;
    // Ids that resolve to no item count as failures rather than aborting.
    report.failed += item_ids.len() - items.len();

    let pending: Vec<(VectorizeItem, String)> = items
        .into_iter()
        .filter(|item| {
            if item.has_vector {
                report.already_vectorized += 1;
                false
            } else {
                true
            }
        })
        .map(|item| {
            let hash = content_hash(&item.text, &item.author_handle, &item.hashtags);
            (item, hash)
        })
        .collect();

    if pending.is_empty() {
        return Ok(report);
    }

    let hashes: Vec<String> = pending.iter().map(|(_, h)| h.clone()).collect();
    let cached = store.cached_vectors(&hashes).await?;

    let mut misses: Vec<&(VectorizeItem, String)> = Vec::new();
    let mut cache_hits = 0usize;
    for entry in &pending {
        let (item, hash) = entry;
        match cached.get(hash) {
            Some(vector) => {
                cache_hits += 1;
                match store.set_item_vector(item.id, vector).await {
                    Ok(()) => report.newly_vectorized += 1,
                    Err(e) => {
                        tracing::warn!(item_id = %item.id, error = %e, "Failed to copy cached vector");
                        report.failed += 1;
                    }
                }
            }
            None => misses.push(entry),
        }
    }
    report.cache_hit_rate = cache_hits as f64 / pending.len() as f64;

    for chunk in misses.chunks(MAX_EMBED_BATCH) {
        let texts: Vec<String> = chunk.iter().map(|(item, _)| item.text.clone()).collect();
        let vectors = match embedder.embed_batch(texts).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, count = chunk.len(), "Embedding batch failed");
                report.failed += chunk.len();
                continue;
            }
        };

        if vectors.len() != chunk.len() {
            tracing::warn!(
                expected = chunk.len(),
                got = vectors.len(),
                "Embedding provider returned a short batch"
            );
        }

        for ((item, hash), vector) in chunk.iter().zip(vectors.iter()) {
            let stored = store
                .store_cache_entry(hash, vector, embedder.model_id())
                .await
                .and(store.set_item_vector(item.id, vector).await);
            match stored {
                Ok(()) => report.newly_vectorized += 1,
                Err(e) => {
                    tracing::warn!(item_id = %item.id, error = %e, "Failed to store embedding");
                    report.failed += 1;
                }
            }
        }
        // Items past the end of a short batch.
        if vectors.len() < chunk.len() {
            report.failed += chunk.len() - vectors.len();
        }
    }

    tracing::info!(
        total = report.total,
        already = report.already_vectorized,
        newly = report.newly_vectorized,
        failed = report.failed,
        cache_hit_rate = report.cache_hit_rate,
        "Vectorization complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Postgres-backed implementation
// ---------------------------------------------------------------------------

/// Vector store over the items and embedding_cache tables. The cache key
/// is the content hash, so two concurrent insertions of the same content
/// collapse to one row.
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VectorizeItemRow {
    id: Uuid,
    text: String,
    author_handle: String,
    hashtags: Vec<String>,
    has_vector: bool,
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn items_for_vectorize(&self, ids: &[Uuid]) -> Result<Vec<VectorizeItem>> {
        let rows = sqlx::query_as::<_, VectorizeItemRow>(
            r#"
            SELECT
                i.id,
                i.text,
                COALESCE(a.handle, '') AS author_handle,
                COALESCE(
                    array_agg(e.normalized_value) FILTER (WHERE e.kind = 'hashtag'),
                    '{}'
                ) AS hashtags,
                (i.vector IS NOT NULL) AS has_vector
            FROM items i
            LEFT JOIN authors a ON a.id = i.author_id
            LEFT JOIN entities e ON e.item_id = i.id
            WHERE i.id = ANY($1)
            GROUP BY i.id, a.handle
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VectorizeItem {
                id: r.id,
                text: r.text,
                author_handle: r.author_handle,
                hashtags: r.hashtags,
                has_vector: r.has_vector,
            })
            .collect())
    }

    async fn cached_vectors(&self, hashes: &[String]) -> Result<HashMap<String, Vec<f32>>> {
        let rows: Vec<(String, pgvector::Vector)> = sqlx::query_as(
            "SELECT content_hash, vector FROM embedding_cache WHERE content_hash = ANY($1)",
        )
        .bind(hashes)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(hash, vector)| (hash, vector.to_vec()))
            .collect())
    }

    async fn store_cache_entry(&self, hash: &str, vector: &[f32], model_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO embedding_cache (content_hash, vector, model_id, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (content_hash) DO NOTHING
            "#,
        )
        .bind(hash)
        .bind(pgvector::Vector::from(vector.to_vec()))
        .bind(model_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_item_vector(&self, item_id: Uuid, vector: &[f32]) -> Result<()> {
        sqlx::query("UPDATE items SET vector = $2 WHERE id = $1")
            .bind(item_id)
            .bind(pgvector::Vector::from(vector.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
