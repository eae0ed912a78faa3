// src/config/resolver.rs
// Effective-value resolution: user preference overlay over dynamic
// config, falling back to a hardcoded default (spec.md §4.4).
//
// `get_effective(field, user_id?) = user_pref[field] ?? dynamic[field] ?? default`

use sqlx::PgPool;

use crate::error::CoreResult;
use crate::users::Preferences;

use super::dynamic::DynamicConfigService;

/// Fields the resolver knows how to overlay with a user preference.
/// Unknown fields fall through to dynamic-only lookup (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveField {
    Model,
    Temperature,
    MaxTokens,
    NumDocumentsToRetrieve,
    CondensePrompt,
    ChatPrompt,
    SystemPrompt,
    TopP,
    TopK,
}

#[derive(Debug, Clone)]
pub enum EffectiveValue {
    Text(Option<String>),
    Int(i64),
    Float(f64),
}

pub struct ConfigResolver {
    db: PgPool,
    dynamic: DynamicConfigService,
}

impl ConfigResolver {
    pub fn new(db: PgPool) -> Self {
        let dynamic = DynamicConfigService::new(db.clone());
        Self { db, dynamic }
    }

    pub async fn get_effective(
        &self,
        field: EffectiveField,
        user_id: Option<&str>,
    ) -> CoreResult<EffectiveValue> {
        let prefs = match user_id {
            Some(id) => self.user_preferences(id).await?,
            None => None,
        };
        let dynamic = self.dynamic.get().await?;

        Ok(match field {
            EffectiveField::Model => EffectiveValue::Text(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_model.clone())
                    .or(Some(dynamic.active_model)),
            ),
            EffectiveField::Temperature => EffectiveValue::Float(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_temperature)
                    .unwrap_or(dynamic.temperature),
            ),
            EffectiveField::MaxTokens => EffectiveValue::Int(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_max_tokens)
                    .unwrap_or(dynamic.max_tokens as i64),
            ),
            EffectiveField::NumDocumentsToRetrieve => EffectiveValue::Int(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_num_documents)
                    .unwrap_or(dynamic.num_documents_to_retrieve as i64),
            ),
            EffectiveField::CondensePrompt => EffectiveValue::Text(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_condense_prompt.clone())
                    .or(dynamic.active_condense_prompt),
            ),
            EffectiveField::ChatPrompt => EffectiveValue::Text(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_chat_prompt.clone())
                    .or(dynamic.active_chat_prompt),
            ),
            EffectiveField::SystemPrompt => EffectiveValue::Text(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_system_prompt.clone())
                    .or(dynamic.active_system_prompt),
            ),
            EffectiveField::TopP => EffectiveValue::Float(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_top_p)
                    .unwrap_or(dynamic.top_p),
            ),
            EffectiveField::TopK => EffectiveValue::Int(
                prefs
                    .as_ref()
                    .and_then(|p| p.preferred_top_k)
                    .unwrap_or(dynamic.top_k as i64),
            ),
        })
    }

    async fn user_preferences(&self, user_id: &str) -> CoreResult<Option<Preferences>> {
        let row = sqlx::query_as::<_, crate::users::models::UserRow>(
            "SELECT id, email, display_name, auth_provider, is_admin, login_count, \
             last_login_at, created_at, updated_at, pref_theme, pref_preferred_model, \
             pref_preferred_temperature, pref_preferred_max_tokens, pref_preferred_num_documents, \
             pref_condense_prompt, pref_chat_prompt, pref_system_prompt, pref_preferred_top_p, \
             pref_preferred_top_k \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| crate::users::User::from(r).preferences))
    }
}
