// src/vectorstore/service.rs
// Chunk storage and retrieval (C6): semantic nearest-neighbor search and
// BM25-blended hybrid search over pgvector.
//
// Grounded on ob-semantic-matcher/src/matcher.rs's `1 - (embedding <=>
// $1::vector)` cosine-similarity idiom and positional-bind query style,
// and on backend/src/memory/features/recall_engine/search/hybrid_search.rs
// for the "combine two ranked lists, deterministic ordering" shape —
// generalized from Qdrant + in-process recency scoring to a single SQL
// query blending pgvector cosine distance with ParadeDB BM25.

use std::sync::Arc;

use pgvector::Vector;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::Capabilities;
use crate::error::{CoreError, CoreResult};

use super::embedder::Embedder;
use super::models::{AddTextsInput, Chunk, MetadataFilter, ScoredChunk};

/// Oversampling factor applied before normalizing BM25 scores within the
/// candidate batch (see `hybrid_search`).
const HYBRID_CANDIDATE_FACTOR: i64 = 5;

pub struct VectorStoreService {
    db: PgPool,
    capabilities: Capabilities,
    collection: Option<String>,
}

impl VectorStoreService {
    pub fn new(db: PgPool, capabilities: Capabilities, collection: Option<String>) -> Self {
        Self {
            db,
            capabilities,
            collection,
        }
    }

    /// Writes one row per text, overwriting on `(document_id, chunk_index)`
    /// conflict (spec.md §4.6).
    pub async fn add_texts(
        &self,
        input: AddTextsInput,
        embedder: &Arc<dyn Embedder>,
    ) -> CoreResult<Vec<i64>> {
        if input.texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = embedder.embed_batch(&input.texts).await.map_err(CoreError::Internal)?;

        let collection = input.collection.as_deref().or(self.collection.as_deref());
        let mut ids = Vec::with_capacity(input.texts.len());

        for (i, text) in input.texts.iter().enumerate() {
            let chunk_index = input
                .chunk_indices
                .as_ref()
                .and_then(|v| v.get(i).copied())
                .unwrap_or(i as i32);

            let mut metadata = input
                .metadatas
                .as_ref()
                .and_then(|v| v.get(i).cloned())
                .unwrap_or_else(|| serde_json::json!({}));
            if let (Some(obj), Some(collection)) = (metadata.as_object_mut(), collection) {
                obj.insert("collection".to_string(), serde_json::Value::String(collection.to_string()));
            }

            let embedding = Vector::from(embeddings[i].clone());

            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO document_chunks (document_id, chunk_index, chunk_text, embedding, metadata)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (document_id, chunk_index) DO UPDATE SET
                    chunk_text = EXCLUDED.chunk_text,
                    embedding = EXCLUDED.embedding,
                    metadata = EXCLUDED.metadata
                RETURNING id
                "#,
            )
            .bind(input.document_id)
            .bind(chunk_index)
            .bind(text)
            .bind(&embedding)
            .bind(&metadata)
            .fetch_one(&self.db)
            .await?;

            ids.push(id);
        }

        Ok(ids)
    }

    /// Nearest-neighbor search under cosine distance, excluding
    /// soft-deleted documents unless `include_deleted` (spec.md §4.6).
    /// Score is `1 - distance`. Ties break on ascending `id`.
    pub async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: i64,
        filter: Option<&MetadataFilter>,
        include_deleted: bool,
    ) -> CoreResult<Vec<ScoredChunk>> {
        let vector = Vector::from(embedding.to_vec());

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT dc.id, dc.document_id, dc.chunk_index, dc.chunk_text, dc.metadata,
                   1 - (dc.embedding <=>
            "#,
        );
        builder.push_bind(vector.clone());
        builder.push("::vector) AS score FROM document_chunks dc JOIN documents d ON d.id = dc.document_id WHERE ");

        if include_deleted {
            builder.push("TRUE");
        } else {
            builder.push("NOT d.is_deleted");
        }

        builder.push(" AND (dc.metadata->>'collection' = ");
        builder.push_bind(self.collection.clone().unwrap_or_default());
        builder.push(" OR dc.metadata->>'collection' IS NULL)");

        if let Some(filter) = filter {
            for (key, value) in filter {
                builder.push(" AND dc.metadata->>").push_bind(key.clone());
                builder.push(" = ").push_bind(value.clone());
            }
        }

        builder.push(" ORDER BY dc.embedding <=> ");
        builder.push_bind(vector);
        builder.push("::vector, dc.id ASC LIMIT ");
        builder.push_bind(k);

        let rows: Vec<(i64, Uuid, i32, String, serde_json::Value, f64)> =
            builder.build_query_as().fetch_all(&self.db).await?;

        Ok(rows
            .into_iter()
            .map(|(id, document_id, chunk_index, chunk_text, metadata, score)| ScoredChunk {
                chunk: Chunk {
                    id,
                    document_id,
                    chunk_index,
                    chunk_text,
                    metadata,
                },
                score,
            })
            .collect())
    }

    /// Blends semantic similarity with BM25 full-text scoring. Fails fast
    /// with `CapabilityUnavailable` if the BM25 operator family isn't
    /// installed — callers (the retriever layer) are expected to catch
    /// this and fall back to `similarity_search_by_vector` (spec.md §4.6,
    /// §8 scenario 4).
    ///
    /// ParadeDB's `paradedb.score()` is unbounded, so BM25 scores are
    /// min-max normalized to `[0, 1]` within the fetched candidate batch
    /// before blending — an explicit resolution of the otherwise
    /// unspecified BM25 scale.
    pub async fn hybrid_search(
        &self,
        query: &str,
        embedder: &Arc<dyn Embedder>,
        k: i64,
        semantic_weight: f64,
        bm25_weight: f64,
        filter: Option<&MetadataFilter>,
    ) -> CoreResult<Vec<ScoredChunk>> {
        if !self.capabilities.bm25 {
            return Err(CoreError::CapabilityUnavailable(
                "BM25 full-text operator (pg_search) is not installed".into(),
            ));
        }

        let embedding = embedder.embed(query).await.map_err(CoreError::Internal)?;
        let vector = Vector::from(embedding);
        let candidate_limit = k.saturating_mul(HYBRID_CANDIDATE_FACTOR).max(k);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT dc.id, dc.document_id, dc.chunk_index, dc.chunk_text, dc.metadata,
                   1 - (dc.embedding <=>
            "#,
        );
        builder.push_bind(vector.clone());
        builder.push("::vector) AS semantic_score, paradedb.score(dc.id) AS bm25_raw ");
        builder.push("FROM document_chunks dc JOIN documents d ON d.id = dc.document_id ");
        builder.push("WHERE NOT d.is_deleted AND dc.chunk_text @@@ ");
        builder.push_bind(query.to_string());
        builder.push(" AND (dc.metadata->>'collection' = ");
        builder.push_bind(self.collection.clone().unwrap_or_default());
        builder.push(" OR dc.metadata->>'collection' IS NULL)");

        if let Some(filter) = filter {
            for (key, value) in filter {
                builder.push(" AND dc.metadata->>").push_bind(key.clone());
                builder.push(" = ").push_bind(value.clone());
            }
        }

        builder.push(" ORDER BY paradedb.score(dc.id) DESC LIMIT ");
        builder.push_bind(candidate_limit);

        let rows: Vec<(i64, Uuid, i32, String, serde_json::Value, f64, f64)> =
            builder.build_query_as().fetch_all(&self.db).await?;

        let max_bm25 = rows.iter().map(|r| r.5.max(0.0)).fold(0.0_f64, f64::max);

        let mut scored: Vec<(i64, ScoredChunk)> = rows
            .into_iter()
            .map(|(id, document_id, chunk_index, chunk_text, metadata, semantic_score, bm25_raw)| {
                let bm25_normalized = if max_bm25 > 0.0 { bm25_raw / max_bm25 } else { 0.0 };
                let combined = semantic_weight * semantic_score + bm25_weight * bm25_normalized;
                (
                    id,
                    ScoredChunk {
                        chunk: Chunk {
                            id,
                            document_id,
                            chunk_index,
                            chunk_text,
                            metadata,
                        },
                        score: combined,
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k as usize);

        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    pub async fn delete_by_document_id(&self, document_id: Uuid) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_ids(&self, ids: &[i64]) -> CoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM document_chunks WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
