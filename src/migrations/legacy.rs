// src/migrations/legacy.rs
// Trait seams for the two legacy stores spec.md §4.2 migrates from: a
// content-addressed vector index and a SQLite document catalog. Concrete
// adapters (e.g. reading an on-disk ChromaDB/SQLite file, per
// original_source/src/utils/migration_manager.py) live outside this
// crate; core only needs the shape to drive a checkpointed batch copy.

use async_trait::async_trait;
use serde_json::Value;

/// One record from the legacy content-addressed vector index.
#[derive(Debug, Clone)]
pub struct LegacyVector {
    /// Content-addressed id as stored in the legacy index; used to derive
    /// a `documents.resource_hash` when no `doc_id` is present in metadata.
    pub id: String,
    pub document_id: Option<String>,
    pub chunk_index: i32,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

#[async_trait]
pub trait LegacyVectorSource: Send + Sync {
    async fn count(&self) -> anyhow::Result<u64>;
    async fn fetch_batch(&self, offset: u64, limit: u64) -> anyhow::Result<Vec<LegacyVector>>;
}

/// One record from the legacy SQLite document catalog.
#[derive(Debug, Clone)]
pub struct LegacyCatalogRow {
    pub rowid: i64,
    pub resource_hash: String,
    pub file_path: String,
    pub display_name: Option<String>,
    pub source_type: Option<String>,
    pub url: Option<String>,
    pub suffix: Option<String>,
    pub size_bytes: Option<i64>,
    pub original_path: Option<String>,
    pub base_path: Option<String>,
    pub relative_path: Option<String>,
}

#[async_trait]
pub trait LegacyCatalogSource: Send + Sync {
    async fn count(&self) -> anyhow::Result<u64>;
    /// Returns rows with `rowid > after`, ordered ascending by `rowid`.
    async fn fetch_batch(&self, after: i64, limit: u64) -> anyhow::Result<Vec<LegacyCatalogRow>>;
}
