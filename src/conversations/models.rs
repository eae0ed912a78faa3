// src/conversations/models.rs
// spec.md §3, §4.8 conversation/message/A-B-comparison entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
    pub link: Option<String>,
    pub context: Option<Value>,
    pub ts: DateTime<Utc>,
    pub model_used: Option<String>,
    pub pipeline_used: Option<String>,
    pub archi_service: Option<String>,
}

/// One message to insert. Batch insertion returns generated ids in input
/// order (spec.md §4.8).
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub sender: String,
    pub content: String,
    pub link: Option<String>,
    pub context: Option<Value>,
    pub model_used: Option<String>,
    pub pipeline_used: Option<String>,
    pub archi_service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Preference {
    A,
    B,
    Tie,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AbComparison {
    pub comparison_id: i64,
    pub conversation_id: String,
    pub user_prompt_mid: i64,
    pub response_a_mid: i64,
    pub response_b_mid: i64,
    pub model_a: String,
    pub pipeline_a: String,
    pub model_b: String,
    pub pipeline_b: String,
    pub is_config_a_first: bool,
    pub preference: Option<String>,
    pub preference_ts: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAbComparison {
    pub conversation_id: String,
    pub user_prompt_mid: i64,
    pub response_a_mid: i64,
    pub response_b_mid: i64,
    pub model_a: String,
    pub pipeline_a: String,
    pub model_b: String,
    pub pipeline_b: String,
    pub is_config_a_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPairAnalytics {
    pub model_a: String,
    pub model_b: String,
    pub total: i64,
    pub a_wins: i64,
    pub b_wins: i64,
    pub ties: i64,
    /// Excludes `skip`/pending comparisons from the denominator (spec.md §4.8).
    pub a_win_rate: f64,
    pub b_win_rate: f64,
}
