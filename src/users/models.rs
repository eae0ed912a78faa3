// src/users/models.rs
// spec.md §3 User entity. Grounded in shape on backend/src/auth/models.rs
// (plain FromRow struct + a distinct "with secrets" variant never handed
// to callers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AuthProvider {
    Anonymous,
    Local,
    Sso,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Option<String>,
    pub preferred_model: Option<String>,
    pub preferred_temperature: Option<f64>,
    pub preferred_max_tokens: Option<i64>,
    pub preferred_num_documents: Option<i64>,
    pub preferred_condense_prompt: Option<String>,
    pub preferred_chat_prompt: Option<String>,
    pub preferred_system_prompt: Option<String>,
    pub preferred_top_p: Option<f64>,
    pub preferred_top_k: Option<i64>,
}

/// A user row without the encrypted API-key columns — the shape every
/// read path that doesn't present the deployment key gets back (spec.md
/// §3: "never returned in plaintext by any read path that does not
/// present the deployment encryption key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub auth_provider: AuthProvider,
    pub is_admin: bool,
    pub login_count: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub preferences: Preferences,
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub auth_provider: String,
    pub is_admin: bool,
    pub login_count: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pref_theme: Option<String>,
    pub pref_preferred_model: Option<String>,
    pub pref_preferred_temperature: Option<f64>,
    pub pref_preferred_max_tokens: Option<i64>,
    pub pref_preferred_num_documents: Option<i64>,
    pub pref_condense_prompt: Option<String>,
    pub pref_chat_prompt: Option<String>,
    pub pref_system_prompt: Option<String>,
    pub pref_preferred_top_p: Option<f64>,
    pub pref_preferred_top_k: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            auth_provider: match row.auth_provider.as_str() {
                "local" => AuthProvider::Local,
                "sso" => AuthProvider::Sso,
                _ => AuthProvider::Anonymous,
            },
            is_admin: row.is_admin,
            login_count: row.login_count,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            preferences: Preferences {
                theme: row.pref_theme,
                preferred_model: row.pref_preferred_model,
                preferred_temperature: row.pref_preferred_temperature,
                preferred_max_tokens: row.pref_preferred_max_tokens,
                preferred_num_documents: row.pref_preferred_num_documents,
                preferred_condense_prompt: row.pref_condense_prompt,
                preferred_chat_prompt: row.pref_chat_prompt,
                preferred_system_prompt: row.pref_system_prompt,
                preferred_top_p: row.pref_preferred_top_p,
                preferred_top_k: row.pref_preferred_top_k,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyProvider {
    OpenAi,
    Anthropic,
    OpenRouter,
}

impl ApiKeyProvider {
    pub(crate) fn column(self) -> &'static str {
        match self {
            ApiKeyProvider::OpenAi => "api_key_openai_enc",
            ApiKeyProvider::Anthropic => "api_key_anthropic_enc",
            ApiKeyProvider::OpenRouter => "api_key_openrouter_enc",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub theme: Option<String>,
    pub preferred_model: Option<String>,
    pub preferred_temperature: Option<f64>,
    pub preferred_max_tokens: Option<i64>,
    pub preferred_num_documents: Option<i64>,
    pub preferred_condense_prompt: Option<String>,
    pub preferred_chat_prompt: Option<String>,
    pub preferred_system_prompt: Option<String>,
    pub preferred_top_p: Option<f64>,
    pub preferred_top_k: Option<i64>,
}
