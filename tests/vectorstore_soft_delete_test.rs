// tests/vectorstore_soft_delete_test.rs
// P2: no semantic search with include_deleted=false ever returns chunks
// of a soft-deleted document (spec.md §4.6, §8 P2).

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use ragcore::catalog::{CatalogService, DocumentUpsert};
use ragcore::db::schema::probe_capabilities;
use ragcore::vectorstore::{AddTextsInput, Embedder, VectorStoreService};

struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let seed = text.len() as f32;
        Ok(vec![seed, 1.0 - seed, 0.0])
    }
}

fn upsert(hash: &str) -> DocumentUpsert {
    DocumentUpsert {
        resource_hash: hash.to_string(),
        file_path: format!("/docs/{hash}.txt"),
        display_name: hash.to_string(),
        source_type: "upload".to_string(),
        url: None,
        ticket_id: None,
        suffix: None,
        size_bytes: None,
        original_path: None,
        base_path: None,
        relative_path: None,
        file_modified_at: None,
        ingested_at: None,
        extra: serde_json::json!({}),
    }
}

#[sqlx::test]
async fn soft_deleted_chunks_are_excluded_by_default(pool: PgPool) {
    common::init(&pool).await;
    let catalog = CatalogService::new(pool.clone());
    let capabilities = probe_capabilities(&pool).await;
    let vectorstore = VectorStoreService::new(pool.clone(), capabilities, None);
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder);

    let doc = catalog.upsert(upsert("deleted-doc")).await.unwrap();
    vectorstore
        .add_texts(
            AddTextsInput {
                document_id: doc.id,
                texts: vec!["hello world".to_string()],
                metadatas: None,
                chunk_indices: None,
                collection: None,
            },
            &embedder,
        )
        .await
        .unwrap();

    catalog.soft_delete(doc.id).await.unwrap();

    let query_embedding = vec![11.0, -10.0, 0.0];
    let results = vectorstore
        .similarity_search_by_vector(&query_embedding, 10, None, false)
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.chunk.document_id != doc.id));

    let results_with_deleted = vectorstore
        .similarity_search_by_vector(&query_embedding, 10, None, true)
        .await
        .unwrap();
    assert!(results_with_deleted
        .iter()
        .any(|r| r.chunk.document_id == doc.id));
}
