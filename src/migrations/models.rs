// src/migrations/models.rs
// spec.md §4.2/§6 resumable migration entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"phase": string, "last_id": integer, "count": integer, "metadata":
/// object}` (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationCheckpoint {
    pub phase: String,
    pub last_id: i64,
    pub count: i64,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatusKind {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    pub migration_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: MigrationStatusKind,
    pub last_checkpoint: MigrationCheckpoint,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationAnalysis {
    pub legacy_vector_count: u64,
    pub legacy_catalog_count: u64,
    pub unmigrated_conversation_count: u64,
    pub estimated_minutes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationStats {
    pub migrated: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropConfigsResult {
    pub table_dropped: bool,
    pub rows_backed_up: u64,
}
