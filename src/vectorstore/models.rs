// src/vectorstore/models.rs
// spec.md §3, §4.6 chunk entity and query shapes.

use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: i64,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub metadata: Value,
}

/// Input to `add_texts`. `ids` lets a caller pin `chunk_index` explicitly;
/// omitted entries are assigned sequentially starting at 0.
#[derive(Debug, Clone, Default)]
pub struct AddTextsInput {
    pub document_id: Uuid,
    pub texts: Vec<String>,
    pub metadatas: Option<Vec<Value>>,
    pub chunk_indices: Option<Vec<i32>>,
    pub collection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Equality filter applied against each chunk's `metadata` JSONB (spec.md
/// §4.6). Tenant scoping (`collection`) is applied separately and always.
pub type MetadataFilter = std::collections::HashMap<String, String>;
