// src/catalog/models.rs
// spec.md §3, §4.5 document catalog entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub resource_hash: String,
    pub file_path: String,
    pub display_name: String,
    pub source_type: String,
    pub url: Option<String>,
    pub ticket_id: Option<String>,
    pub suffix: Option<String>,
    pub size_bytes: Option<i64>,
    pub original_path: Option<String>,
    pub base_path: Option<String>,
    pub relative_path: Option<String>,
    pub file_modified_at: Option<DateTime<Utc>>,
    pub ingested_at: Option<DateTime<Utc>>,
    pub extra_json: Value,
    pub extra_text: String,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input to `upsert`, keyed by `resource_hash`. Unknown metadata keys are
/// carried in `extra` and also flattened into `extra_text` for substring
/// search (spec.md §4.5).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpsert {
    pub resource_hash: String,
    pub file_path: String,
    pub display_name: String,
    pub source_type: String,
    pub url: Option<String>,
    pub ticket_id: Option<String>,
    pub suffix: Option<String>,
    pub size_bytes: Option<i64>,
    pub original_path: Option<String>,
    pub base_path: Option<String>,
    pub relative_path: Option<String>,
    pub file_modified_at: Option<DateTime<Utc>>,
    pub ingested_at: Option<DateTime<Utc>>,
    pub extra: Value,
}

/// A single AND-group of metadata filter clauses. Known column names
/// match exactly; anything else is matched as `extra_text ILIKE
/// '%key:value%'` (spec.md §4.5).
pub type FilterGroup = std::collections::HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct SearchMetadataQuery {
    pub query: Option<String>,
    /// OR'd across groups; AND'd within a group.
    pub filters: Vec<FilterGroup>,
    pub limit: Option<i64>,
}
