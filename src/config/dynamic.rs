// src/config/dynamic.rs
// Always-read-through dynamic configuration (spec.md §4.4): unlike
// `StaticConfigCache`, there is no in-process cache here — every read
// hits the database so that a write from any process is visible
// immediately.

use sqlx::PgPool;

use crate::error::{CoreError, CoreResult};

use super::audit::{self, ConfigKind};
use super::models::{DynamicConfig, DynamicConfigUpdate};

pub struct DynamicConfigService {
    db: PgPool,
}

impl DynamicConfigService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self) -> CoreResult<DynamicConfig> {
        fetch(&self.db).await
    }

    /// Inserts the singleton row with the given required fields if it
    /// doesn't exist yet; a no-op otherwise. Every other column falls
    /// back to its schema default. Used by deployment bootstrap, which
    /// must not clobber an already-initialized row (spec.md §4.4).
    pub async fn ensure_row_exists(&self, active_pipeline: &str, active_model: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dynamic_config (id, active_pipeline, active_model)
            VALUES (TRUE, $1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(active_pipeline)
        .bind(active_model)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Validates every provided field atomically, then writes them all in
    /// one transaction with a matching audit row per changed field
    /// (spec.md §4.4). Validation failure touches nothing.
    pub async fn update(
        &self,
        update: DynamicConfigUpdate,
        user_id: Option<&str>,
    ) -> CoreResult<DynamicConfig> {
        let allowed: Option<(serde_json::Value, serde_json::Value)> = sqlx::query_as(
            "SELECT available_pipelines, available_models FROM static_config WHERE id = TRUE",
        )
        .fetch_optional(&self.db)
        .await?;
        let as_strings = |v: &serde_json::Value| -> Vec<String> {
            v.as_array()
                .map(|arr| arr.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };
        let (available_pipelines, available_models) = match &allowed {
            Some((pipelines, models)) => (as_strings(pipelines), as_strings(models)),
            None => (Vec::new(), Vec::new()),
        };

        validate(&update, &available_pipelines, &available_models)?;

        let before = fetch(&self.db).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE dynamic_config SET
                active_pipeline = COALESCE($1, active_pipeline),
                active_model = COALESCE($2, active_model),
                temperature = COALESCE($3, temperature),
                max_tokens = COALESCE($4, max_tokens),
                system_prompt = COALESCE($5, system_prompt),
                top_p = COALESCE($6, top_p),
                top_k = COALESCE($7, top_k),
                repetition_penalty = COALESCE($8, repetition_penalty),
                active_condense_prompt = COALESCE($9, active_condense_prompt),
                active_chat_prompt = COALESCE($10, active_chat_prompt),
                active_system_prompt = COALESCE($11, active_system_prompt),
                num_documents_to_retrieve = COALESCE($12, num_documents_to_retrieve),
                use_hybrid_search = COALESCE($13, use_hybrid_search),
                bm25_weight = COALESCE($14, bm25_weight),
                semantic_weight = COALESCE($15, semantic_weight),
                bm25_k1 = COALESCE($16, bm25_k1),
                bm25_b = COALESCE($17, bm25_b),
                ingestion_schedule = COALESCE($18, ingestion_schedule),
                verbosity = COALESCE($19, verbosity),
                updated_at = now(),
                updated_by = COALESCE($20, updated_by)
            WHERE id = TRUE
            "#,
        )
        .bind(&update.active_pipeline)
        .bind(&update.active_model)
        .bind(update.temperature)
        .bind(update.max_tokens)
        .bind(&update.system_prompt)
        .bind(update.top_p)
        .bind(update.top_k)
        .bind(update.repetition_penalty)
        .bind(&update.active_condense_prompt)
        .bind(&update.active_chat_prompt)
        .bind(&update.active_system_prompt)
        .bind(update.num_documents_to_retrieve)
        .bind(update.use_hybrid_search)
        .bind(update.bm25_weight)
        .bind(update.semantic_weight)
        .bind(update.bm25_k1)
        .bind(update.bm25_b)
        .bind(&update.ingestion_schedule)
        .bind(&update.verbosity)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        for (field, old, new) in changed_fields(&before, &update) {
            audit::record(&mut tx, user_id, ConfigKind::Dynamic, field, old.as_deref(), new.as_deref()).await;
        }

        tx.commit().await?;

        fetch(&self.db).await
    }
}

fn validate(
    update: &DynamicConfigUpdate,
    available_pipelines: &[String],
    available_models: &[String],
) -> CoreResult<()> {
    if let Some(pipeline) = &update.active_pipeline {
        if !available_pipelines.is_empty() && !available_pipelines.contains(pipeline) {
            return Err(CoreError::config_validation(
                "active_pipeline",
                format!("'{pipeline}' is not in available_pipelines"),
            ));
        }
    }
    if let Some(model) = &update.active_model {
        if !available_models.is_empty() && !available_models.contains(model) {
            return Err(CoreError::config_validation(
                "active_model",
                format!("'{model}' is not in available_models"),
            ));
        }
    }
    if let Some(t) = update.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(CoreError::config_validation("temperature", "must be in [0, 2]"));
        }
    }
    if let Some(mt) = update.max_tokens {
        if mt < 1 {
            return Err(CoreError::config_validation("max_tokens", "must be >= 1"));
        }
    }
    if let Some(w) = update.bm25_weight {
        if !(0.0..=1.0).contains(&w) {
            return Err(CoreError::config_validation("bm25_weight", "must be in [0, 1]"));
        }
    }
    if let Some(w) = update.semantic_weight {
        if !(0.0..=1.0).contains(&w) {
            return Err(CoreError::config_validation("semantic_weight", "must be in [0, 1]"));
        }
    }
    if let Some(p) = update.top_p {
        if !(0.0..=1.0).contains(&p) {
            return Err(CoreError::config_validation("top_p", "must be in [0, 1]"));
        }
    }
    if let Some(k) = update.top_k {
        if k < 0 {
            return Err(CoreError::config_validation("top_k", "must be >= 0"));
        }
    }
    if let Some(n) = update.num_documents_to_retrieve {
        if n < 1 {
            return Err(CoreError::config_validation(
                "num_documents_to_retrieve",
                "must be >= 1",
            ));
        }
    }
    Ok(())
}

/// Diffs the provided fields of `update` against `before`, yielding
/// `(field_name, old, new)` for fields that actually changed — audited
/// individually per spec.md §4.4.
fn changed_fields(
    before: &DynamicConfig,
    update: &DynamicConfigUpdate,
) -> Vec<(&'static str, Option<String>, Option<String>)> {
    let mut out = Vec::new();
    macro_rules! diff {
        ($name:literal, $field:ident) => {
            if let Some(new) = &update.$field {
                let old = before.$field.as_ref().map(|v| v.to_string());
                let new_s = Some(new.to_string());
                if old != new_s {
                    out.push(($name, old, new_s));
                }
            }
        };
        ($name:literal, $field:ident, copy) => {
            if let Some(new) = update.$field {
                let old = Some(before.$field.to_string());
                let new_s = Some(new.to_string());
                if old != new_s {
                    out.push(($name, old, new_s));
                }
            }
        };
    }

    if let Some(p) = &update.active_pipeline {
        if &before.active_pipeline != p {
            out.push(("active_pipeline", Some(before.active_pipeline.clone()), Some(p.clone())));
        }
    }
    if let Some(m) = &update.active_model {
        if &before.active_model != m {
            out.push(("active_model", Some(before.active_model.clone()), Some(m.clone())));
        }
    }
    diff!("temperature", temperature, copy);
    diff!("max_tokens", max_tokens, copy);
    diff!("system_prompt", system_prompt);
    diff!("top_p", top_p, copy);
    diff!("top_k", top_k, copy);
    diff!("repetition_penalty", repetition_penalty, copy);
    diff!("active_condense_prompt", active_condense_prompt);
    diff!("active_chat_prompt", active_chat_prompt);
    diff!("active_system_prompt", active_system_prompt);
    diff!("num_documents_to_retrieve", num_documents_to_retrieve, copy);
    diff!("use_hybrid_search", use_hybrid_search, copy);
    diff!("bm25_weight", bm25_weight, copy);
    diff!("semantic_weight", semantic_weight, copy);
    diff!("bm25_k1", bm25_k1, copy);
    diff!("bm25_b", bm25_b, copy);
    diff!("verbosity", verbosity);

    out
}

async fn fetch(db: &PgPool) -> CoreResult<DynamicConfig> {
    sqlx::query_as::<_, DynamicConfig>(
        r#"
        SELECT active_pipeline, active_model, temperature, max_tokens, system_prompt,
               top_p, top_k, repetition_penalty, active_condense_prompt, active_chat_prompt,
               active_system_prompt, num_documents_to_retrieve, use_hybrid_search,
               bm25_weight, semantic_weight, bm25_k1, bm25_b, ingestion_schedule,
               verbosity, updated_at, updated_by
        FROM dynamic_config WHERE id = TRUE
        "#,
    )
    .fetch_optional(db)
    .await?
    .ok_or_else(|| CoreError::NotFound("dynamic_config has not been initialized".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_temperature_out_of_range() {
        let update = DynamicConfigUpdate {
            temperature: Some(3.0),
            ..Default::default()
        };
        assert!(validate(&update, &[], &[]).is_err());
    }

    #[test]
    fn rejects_unlisted_pipeline() {
        let update = DynamicConfigUpdate {
            active_pipeline: Some("ghost".into()),
            ..Default::default()
        };
        assert!(validate(&update, &["default".into()], &[]).is_err());
    }

    #[test]
    fn allows_any_pipeline_when_list_empty() {
        let update = DynamicConfigUpdate {
            active_pipeline: Some("anything".into()),
            ..Default::default()
        };
        assert!(validate(&update, &[], &[]).is_ok());
    }
}
