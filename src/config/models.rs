// src/config/models.rs
// spec.md §3, §4.4 data shapes for the singleton config rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StaticConfig {
    pub deployment_name: String,
    pub config_version: String,
    pub data_path: String,
    pub embedding_model: String,
    pub embedding_dimensions: i32,
    pub chunk_size: i32,
    pub chunk_overlap: i32,
    pub distance_metric: String,
    pub available_pipelines: Value,
    pub available_models: Value,
    pub available_providers: Value,
    pub auth_enabled: bool,
    pub session_lifetime_days: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DynamicConfig {
    pub active_pipeline: String,
    pub active_model: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub system_prompt: Option<String>,
    pub top_p: f64,
    pub top_k: i32,
    pub repetition_penalty: f64,
    pub active_condense_prompt: Option<String>,
    pub active_chat_prompt: Option<String>,
    pub active_system_prompt: Option<String>,
    pub num_documents_to_retrieve: i32,
    pub use_hybrid_search: bool,
    pub bm25_weight: f64,
    pub semantic_weight: f64,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    pub ingestion_schedule: Value,
    pub verbosity: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub updated_by: Option<String>,
}

/// A partial write to `DynamicConfig`: every field is optional, and every
/// provided field is validated atomically before anything is written
/// (spec.md §4.4).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicConfigUpdate {
    pub active_pipeline: Option<String>,
    pub active_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub system_prompt: Option<String>,
    pub top_p: Option<f64>,
    pub top_k: Option<i32>,
    pub repetition_penalty: Option<f64>,
    pub active_condense_prompt: Option<String>,
    pub active_chat_prompt: Option<String>,
    pub active_system_prompt: Option<String>,
    pub num_documents_to_retrieve: Option<i32>,
    pub use_hybrid_search: Option<bool>,
    pub bm25_weight: Option<f64>,
    pub semantic_weight: Option<f64>,
    pub bm25_k1: Option<f64>,
    pub bm25_b: Option<f64>,
    pub ingestion_schedule: Option<Value>,
    pub verbosity: Option<String>,
}

/// A deployment description used to (re)initialize config on startup —
/// static config is overwritten wholesale; dynamic config is seeded only
/// if untouched by a human (spec.md §4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentDescription {
    pub static_config: StaticConfig,
    pub dynamic_defaults: DynamicConfigUpdate,
}
