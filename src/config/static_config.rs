// src/config/static_config.rs
// Cached-in-process static configuration, invalidated by `reload()`
// (spec.md §4.4). `ArcSwap` takes the place of the teacher's
// `lazy_static!` + `RwLock` in backend/src/config/mod.rs: a lock-free
// read path, with a write path lazy_static! doesn't support.

use std::sync::Arc;

use arc_swap::ArcSwap;
use sqlx::PgPool;

use crate::error::{CoreError, CoreResult};

use super::models::StaticConfig;

const VALID_METRICS: [&str; 3] = ["cosine", "l2", "inner_product"];

pub struct StaticConfigCache {
    db: PgPool,
    cached: ArcSwap<StaticConfig>,
}

impl StaticConfigCache {
    /// Loads the singleton row once at startup. Fails if the deployment
    /// has never been initialized (see [`Self::initialize`]).
    pub async fn load(db: PgPool) -> CoreResult<Self> {
        let config = fetch(&db).await?;
        Ok(Self {
            db,
            cached: ArcSwap::from_pointee(config),
        })
    }

    /// First-run variant of [`Self::load`]: seeds the in-process cache
    /// from `config` instead of requiring a row to already exist, for
    /// deployments bootstrapping against an empty `static_config` table.
    /// Callers still need [`Self::initialize`] to persist it.
    pub fn bootstrap(db: PgPool, config: StaticConfig) -> Self {
        Self {
            db,
            cached: ArcSwap::from_pointee(config),
        }
    }

    /// Returns the cached snapshot without touching the database.
    pub fn get(&self) -> Arc<StaticConfig> {
        self.cached.load_full()
    }

    /// Re-reads the row from the database and swaps the cache.
    pub async fn reload(&self) -> CoreResult<()> {
        let fresh = fetch(&self.db).await?;
        self.cached.store(Arc::new(fresh));
        Ok(())
    }

    /// UPSERT-style initialization from a deployment description: the
    /// static row is always overwritten wholesale (spec.md §4.4).
    pub async fn initialize(&self, config: &StaticConfig) -> CoreResult<()> {
        validate_distance_metric(&config.distance_metric)?;

        sqlx::query(
            r#"
            INSERT INTO static_config (
                id, deployment_name, config_version, data_path, embedding_model,
                embedding_dimensions, chunk_size, chunk_overlap, distance_metric,
                available_pipelines, available_models, available_providers,
                auth_enabled, session_lifetime_days
            ) VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                deployment_name = EXCLUDED.deployment_name,
                config_version = EXCLUDED.config_version,
                data_path = EXCLUDED.data_path,
                embedding_model = EXCLUDED.embedding_model,
                embedding_dimensions = EXCLUDED.embedding_dimensions,
                chunk_size = EXCLUDED.chunk_size,
                chunk_overlap = EXCLUDED.chunk_overlap,
                distance_metric = EXCLUDED.distance_metric,
                available_pipelines = EXCLUDED.available_pipelines,
                available_models = EXCLUDED.available_models,
                available_providers = EXCLUDED.available_providers,
                auth_enabled = EXCLUDED.auth_enabled,
                session_lifetime_days = EXCLUDED.session_lifetime_days
            "#,
        )
        .bind(&config.deployment_name)
        .bind(&config.config_version)
        .bind(&config.data_path)
        .bind(&config.embedding_model)
        .bind(config.embedding_dimensions)
        .bind(config.chunk_size)
        .bind(config.chunk_overlap)
        .bind(&config.distance_metric)
        .bind(&config.available_pipelines)
        .bind(&config.available_models)
        .bind(&config.available_providers)
        .bind(config.auth_enabled)
        .bind(config.session_lifetime_days)
        .execute(&self.db)
        .await?;

        self.reload().await
    }
}

fn validate_distance_metric(value: &str) -> CoreResult<()> {
    if !VALID_METRICS.contains(&value) {
        return Err(CoreError::config_validation(
            "distance_metric",
            format!("must be one of {VALID_METRICS:?}, got '{value}'"),
        ));
    }
    Ok(())
}

async fn fetch(db: &PgPool) -> CoreResult<StaticConfig> {
    sqlx::query_as::<_, StaticConfig>(
        r#"
        SELECT deployment_name, config_version, data_path, embedding_model,
               embedding_dimensions, chunk_size, chunk_overlap, distance_metric,
               available_pipelines, available_models, available_providers,
               auth_enabled, session_lifetime_days
        FROM static_config WHERE id = TRUE
        "#,
    )
    .fetch_optional(db)
    .await?
    .ok_or_else(|| CoreError::NotFound("static_config has not been initialized".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_distance_metric() {
        assert!(validate_distance_metric("cosine").is_ok());
        assert!(validate_distance_metric("manhattan").is_err());
    }
}
