// src/migrations/service.rs
// Resumable legacy-store migration framework (C2, spec.md §4.2).
//
// Grounded on original_source/src/utils/migration_manager.py's
// checkpoint/resume/batch-size conventions, rewritten against the
// `migration_state` table and `sqlx` transactions instead of raw
// psycopg2 cursors plus manual commits.

use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

use super::legacy::{LegacyCatalogSource, LegacyVectorSource};
use super::models::{
    DropConfigsResult, MigrationAnalysis, MigrationCheckpoint, MigrationState, MigrationStats,
    MigrationStatusKind,
};

pub const BATCH_SIZE_VECTORS: u64 = 100;
pub const BATCH_SIZE_DOCUMENTS: u64 = 500;
pub const BATCH_SIZE_CONVERSATIONS: u64 = 1000;

pub struct MigrationService {
    db: PgPool,
}

impl MigrationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn status(&self, migration_name: &str) -> CoreResult<Option<MigrationState>> {
        let row: Option<(String, chrono::DateTime<Utc>, Option<chrono::DateTime<Utc>>, String, serde_json::Value, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT migration_name, started_at, completed_at, status, last_checkpoint, error_message
                FROM migration_state WHERE migration_name = $1
                "#,
            )
            .bind(migration_name)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(
            |(migration_name, started_at, completed_at, status, checkpoint, error_message)| MigrationState {
                migration_name,
                started_at,
                completed_at,
                status: match status.as_str() {
                    "completed" => MigrationStatusKind::Completed,
                    "failed" => MigrationStatusKind::Failed,
                    _ => MigrationStatusKind::InProgress,
                },
                last_checkpoint: serde_json::from_value(checkpoint).unwrap_or_default(),
                error_message,
            },
        ))
    }

    /// Starts a fresh migration or reopens a previously failed one. A
    /// `completed` migration is left untouched (spec.md §4.2: a rerun
    /// resumes, it never restarts a finished migration).
    async fn start(&self, migration_name: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO migration_state (migration_name, status)
            VALUES ($1, 'in_progress')
            ON CONFLICT (migration_name) DO UPDATE SET
                started_at = CASE WHEN migration_state.status = 'failed' THEN now() ELSE migration_state.started_at END,
                status = CASE WHEN migration_state.status = 'completed' THEN migration_state.status ELSE 'in_progress' END,
                error_message = CASE WHEN migration_state.status = 'completed' THEN migration_state.error_message ELSE NULL END
            "#,
        )
        .bind(migration_name)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn checkpoint(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        migration_name: &str,
        checkpoint: &MigrationCheckpoint,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE migration_state SET last_checkpoint = $2 WHERE migration_name = $1")
            .bind(migration_name)
            .bind(json!(checkpoint))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn complete(&self, migration_name: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE migration_state SET status = 'completed', completed_at = now() WHERE migration_name = $1",
        )
        .bind(migration_name)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn fail(&self, migration_name: &str, error: &str) -> CoreResult<()> {
        sqlx::query("UPDATE migration_state SET status = 'failed', error_message = $2 WHERE migration_name = $1")
            .bind(migration_name)
            .bind(error)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Read-only counts/estimate, no mutation (spec.md §4.2).
    pub async fn analyze(
        &self,
        vectors: Option<&dyn LegacyVectorSource>,
        catalog: Option<&dyn LegacyCatalogSource>,
    ) -> CoreResult<MigrationAnalysis> {
        let legacy_vector_count = match vectors {
            Some(source) => source
                .count()
                .await
                .map_err(|err| CoreError::Internal(err))?,
            None => 0,
        };
        let legacy_catalog_count = match catalog {
            Some(source) => source
                .count()
                .await
                .map_err(|err| CoreError::Internal(err))?,
            None => 0,
        };
        let unmigrated_conversation_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_messages WHERE conf_id IS NOT NULL AND model_used IS NULL",
        )
        .fetch_one(&self.db)
        .await?;

        let total = legacy_vector_count + legacy_catalog_count + unmigrated_conversation_count as u64;
        Ok(MigrationAnalysis {
            legacy_vector_count,
            legacy_catalog_count,
            unmigrated_conversation_count: unmigrated_conversation_count as u64,
            estimated_minutes: (total / 1000).max(1),
        })
    }

    /// Migrates the legacy vector index into `documents`/`document_chunks`
    /// in batches of [`BATCH_SIZE_VECTORS`], resuming from the last
    /// checkpoint when `resume` is true (spec.md §4.2).
    pub async fn migrate_vectors(&self, source: &dyn LegacyVectorSource, resume: bool) -> CoreResult<MigrationStats> {
        const NAME: &str = "legacy_vectors";

        if let Some(state) = self.status(NAME).await? {
            if state.status == MigrationStatusKind::Completed {
                return Ok(MigrationStats { migrated: state.last_checkpoint.count as u64, total: 0 });
            }
        }

        self.start(NAME).await?;

        let total = source.count().await.map_err(CoreError::Internal)?;
        let prior = self.status(NAME).await?;
        let mut offset = if resume { prior.as_ref().map(|s| s.last_checkpoint.last_id as u64).unwrap_or(0) } else { 0 };
        let mut migrated = if resume { prior.as_ref().map(|s| s.last_checkpoint.count as u64).unwrap_or(0) } else { 0 };

        let result = self.run_vector_batches(source, NAME, total, &mut offset, &mut migrated).await;
        match result {
            Ok(()) => {
                self.complete(NAME).await?;
                Ok(MigrationStats { migrated, total })
            }
            Err(err) => {
                self.fail(NAME, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn run_vector_batches(
        &self,
        source: &dyn LegacyVectorSource,
        name: &str,
        total: u64,
        offset: &mut u64,
        migrated: &mut u64,
    ) -> CoreResult<()> {
        loop {
            if *offset >= total {
                break;
            }

            let batch = source
                .fetch_batch(*offset, BATCH_SIZE_VECTORS)
                .await
                .map_err(CoreError::Internal)?;
            if batch.is_empty() {
                break;
            }

            let mut tx = self.db.begin().await?;

            for vector in &batch {
                let resource_hash = vector.document_id.clone().unwrap_or_else(|| vector.id.clone());
                let placeholder_path = format!("migrated_{resource_hash}");
                let display_name = format!("Document {resource_hash}");

                sqlx::query(
                    r#"
                    INSERT INTO documents (resource_hash, file_path, display_name, source_type)
                    VALUES ($1, $2, $3, 'unknown')
                    ON CONFLICT (resource_hash) DO NOTHING
                    "#,
                )
                .bind(&resource_hash)
                .bind(&placeholder_path)
                .bind(&display_name)
                .execute(&mut *tx)
                .await?;

                let document_id: uuid::Uuid =
                    sqlx::query_scalar("SELECT id FROM documents WHERE resource_hash = $1")
                        .bind(&resource_hash)
                        .fetch_one(&mut *tx)
                        .await?;

                let embedding = pgvector::Vector::from(vector.embedding.clone());
                sqlx::query(
                    r#"
                    INSERT INTO document_chunks (document_id, chunk_index, chunk_text, embedding, metadata)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (document_id, chunk_index) DO UPDATE SET
                        chunk_text = EXCLUDED.chunk_text, embedding = EXCLUDED.embedding, metadata = EXCLUDED.metadata
                    "#,
                )
                .bind(document_id)
                .bind(vector.chunk_index)
                .bind(&vector.text)
                .bind(embedding)
                .bind(&vector.metadata)
                .execute(&mut *tx)
                .await?;
            }

            *offset += batch.len() as u64;
            *migrated += batch.len() as u64;

            self.checkpoint(
                &mut tx,
                name,
                &MigrationCheckpoint { phase: "vectors".into(), last_id: *offset as i64, count: *migrated as i64, metadata: None },
            )
            .await?;
            tx.commit().await?;

            info!(migrated, total, "migrated legacy vectors");
        }
        Ok(())
    }

    /// Migrates the legacy SQLite catalog into `documents` in batches of
    /// [`BATCH_SIZE_DOCUMENTS`] (spec.md §4.2).
    pub async fn migrate_catalog(&self, source: &dyn LegacyCatalogSource, resume: bool) -> CoreResult<MigrationStats> {
        const NAME: &str = "legacy_catalog";

        if let Some(state) = self.status(NAME).await? {
            if state.status == MigrationStatusKind::Completed {
                return Ok(MigrationStats { migrated: state.last_checkpoint.count as u64, total: 0 });
            }
        }

        self.start(NAME).await?;

        let total = source.count().await.map_err(CoreError::Internal)?;
        let prior = self.status(NAME).await?;
        let mut after = if resume { prior.as_ref().map(|s| s.last_checkpoint.last_id).unwrap_or(0) } else { 0 };
        let mut migrated = if resume { prior.as_ref().map(|s| s.last_checkpoint.count as u64).unwrap_or(0) } else { 0 };

        let result = self.run_catalog_batches(source, NAME, total, &mut after, &mut migrated).await;
        match result {
            Ok(()) => {
                self.complete(NAME).await?;
                Ok(MigrationStats { migrated, total })
            }
            Err(err) => {
                self.fail(NAME, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn run_catalog_batches(
        &self,
        source: &dyn LegacyCatalogSource,
        name: &str,
        total: u64,
        after: &mut i64,
        migrated: &mut u64,
    ) -> CoreResult<()> {
        loop {
            let batch = source
                .fetch_batch(*after, BATCH_SIZE_DOCUMENTS)
                .await
                .map_err(CoreError::Internal)?;
            if batch.is_empty() {
                break;
            }

            let mut tx = self.db.begin().await?;
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO documents (resource_hash, file_path, display_name, source_type, url, suffix, size_bytes, original_path, base_path, relative_path) ",
            );
            builder.push_values(&batch, |mut b, row| {
                b.push_bind(&row.resource_hash)
                    .push_bind(&row.file_path)
                    .push_bind(row.display_name.clone().unwrap_or_else(|| "Unknown".to_string()))
                    .push_bind(row.source_type.clone().unwrap_or_else(|| "unknown".to_string()))
                    .push_bind(&row.url)
                    .push_bind(&row.suffix)
                    .push_bind(row.size_bytes)
                    .push_bind(&row.original_path)
                    .push_bind(&row.base_path)
                    .push_bind(&row.relative_path);
            });
            builder.push(
                " ON CONFLICT (resource_hash) DO UPDATE SET \
                  display_name = COALESCE(EXCLUDED.display_name, documents.display_name), \
                  url = COALESCE(EXCLUDED.url, documents.url)",
            );
            builder.build().execute(&mut *tx).await?;

            *after = batch.last().map(|r| r.rowid).unwrap_or(*after);
            *migrated += batch.len() as u64;

            self.checkpoint(
                &mut tx,
                name,
                &MigrationCheckpoint { phase: "documents".into(), last_id: *after, count: *migrated as i64, metadata: None },
            )
            .await?;
            tx.commit().await?;

            info!(migrated, total, "migrated legacy catalog documents");
        }
        Ok(())
    }

    /// Populates `model_used`/`pipeline_used` on legacy messages that
    /// still carry a `conf_id` (spec.md §4.2), in batches of
    /// [`BATCH_SIZE_CONVERSATIONS`].
    pub async fn migrate_conversation_schema(&self) -> CoreResult<MigrationStats> {
        const NAME: &str = "conversation_schema";

        if let Some(state) = self.status(NAME).await? {
            if state.status == MigrationStatusKind::Completed {
                return Ok(MigrationStats { migrated: state.last_checkpoint.count as u64, total: 0 });
            }
        }

        self.start(NAME).await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_messages WHERE conf_id IS NOT NULL AND model_used IS NULL",
        )
        .fetch_one(&self.db)
        .await?;

        let mut last_id: i64 = 0;
        let mut migrated: u64 = 0;

        let result: CoreResult<()> = async {
            loop {
                let rows: Vec<(i64, i64)> = sqlx::query_as(
                    r#"
                    SELECT message_id, conf_id FROM conversation_messages
                    WHERE message_id > $1 AND conf_id IS NOT NULL AND model_used IS NULL
                    ORDER BY message_id LIMIT $2
                    "#,
                )
                .bind(last_id)
                .bind(BATCH_SIZE_CONVERSATIONS as i64)
                .fetch_all(&self.db)
                .await?;

                if rows.is_empty() {
                    break;
                }

                let mut tx = self.db.begin().await?;
                for (message_id, conf_id) in &rows {
                    let (model, pipeline) = self.lookup_config(&mut tx, *conf_id).await?;
                    sqlx::query(
                        "UPDATE conversation_messages SET model_used = $2, pipeline_used = $3 WHERE message_id = $1",
                    )
                    .bind(message_id)
                    .bind(&model)
                    .bind(&pipeline)
                    .execute(&mut *tx)
                    .await?;
                }

                last_id = rows.last().map(|(id, _)| *id).unwrap_or(last_id);
                migrated += rows.len() as u64;

                self.checkpoint(
                    &mut tx,
                    NAME,
                    &MigrationCheckpoint { phase: "conversations".into(), last_id, count: migrated as i64, metadata: None },
                )
                .await?;
                tx.commit().await?;
                info!(migrated, total, "migrated legacy conversation schema");
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.complete(NAME).await?;
                Ok(MigrationStats { migrated, total: total as u64 })
            }
            Err(err) => {
                self.fail(NAME, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn lookup_config(&self, tx: &mut Transaction<'_, Postgres>, conf_id: i64) -> CoreResult<(String, String)> {
        let config: Option<serde_json::Value> = sqlx::query_scalar("SELECT config FROM configs WHERE config_id = $1")
            .bind(conf_id)
            .fetch_optional(&mut **tx)
            .await?;

        let Some(config) = config else {
            return Ok(("unknown".to_string(), "unknown".to_string()));
        };

        let model = config
            .get("model")
            .or_else(|| config.get("chat_model"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let pipeline = config
            .get("pipeline")
            .or_else(|| config.get("pipeline_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("QAPipeline")
            .to_string();
        Ok((model, pipeline))
    }

    /// Drops the legacy `configs` table, refusing while any conversation
    /// still references it (spec.md §4.2's terminal step).
    pub async fn drop_configs_table(&self) -> CoreResult<DropConfigsResult> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'configs')",
        )
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Ok(DropConfigsResult { table_dropped: false, rows_backed_up: 0 });
        }

        let unmigrated: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_messages WHERE conf_id IS NOT NULL AND model_used IS NULL",
        )
        .fetch_one(&self.db)
        .await?;

        if unmigrated > 0 {
            return Err(CoreError::MigrationBlocked(format!(
                "{unmigrated} conversation messages have conf_id but no model_used; run migrate_conversation_schema first"
            )));
        }

        let mut tx = self.db.begin().await?;
        sqlx::raw_sql("CREATE TABLE IF NOT EXISTS configs_backup AS SELECT * FROM configs")
            .execute(&mut *tx)
            .await?;
        let rows_backed_up: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM configs_backup")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::raw_sql("ALTER TABLE conversation_messages DROP COLUMN IF EXISTS conf_id")
            .execute(&mut *tx)
            .await?;
        sqlx::raw_sql("ALTER TABLE ab_comparisons DROP COLUMN IF EXISTS config_a_id, DROP COLUMN IF EXISTS config_b_id")
            .execute(&mut *tx)
            .await?;
        sqlx::raw_sql("DROP TABLE configs").execute(&mut *tx).await?;
        tx.commit().await?;

        warn!(rows_backed_up, "dropped legacy configs table");
        Ok(DropConfigsResult { table_dropped: true, rows_backed_up: rows_backed_up as u64 })
    }
}
