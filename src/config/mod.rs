// src/config/mod.rs
// Database-backed runtime configuration (C4) — distinct from
// `crate::settings`, which is deploy-time bootstrap config read from the
// environment before a database connection even exists.

pub mod audit;
pub mod dynamic;
pub mod models;
pub mod resolver;
pub mod static_config;

pub use dynamic::DynamicConfigService;
pub use models::{DeploymentDescription, DynamicConfig, DynamicConfigUpdate, StaticConfig};
pub use resolver::{ConfigResolver, EffectiveField, EffectiveValue};
pub use static_config::StaticConfigCache;

use sqlx::PgPool;

use crate::error::CoreResult;

/// UPSERT-style bootstrap from a deployment description (spec.md §4.4):
/// static config is always overwritten; dynamic config is seeded only if
/// no admin has ever touched it (`updated_by IS NULL`), so runtime
/// settings changed through the API survive redeploys.
pub async fn initialize_from_deployment(
    db: &PgPool,
    statics: &StaticConfigCache,
    desc: &DeploymentDescription,
) -> CoreResult<()> {
    statics.initialize(&desc.static_config).await?;

    let untouched: bool = sqlx::query_scalar(
        "SELECT updated_by IS NULL FROM dynamic_config WHERE id = TRUE",
    )
    .fetch_optional(db)
    .await?
    .unwrap_or(true);

    if untouched {
        let dynamic = DynamicConfigService::new(db.clone());
        let pipeline = desc.dynamic_defaults.active_pipeline.as_deref().unwrap_or("default");
        let model = desc.dynamic_defaults.active_model.as_deref().unwrap_or("default");
        dynamic.ensure_row_exists(pipeline, model).await?;
        dynamic.update(desc.dynamic_defaults.clone(), None).await?;
    }

    Ok(())
}
