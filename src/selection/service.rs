// src/selection/service.rs
// Three-tier document selection resolver (C7): conversation override >
// user default > system default TRUE (spec.md §4.7).
//
// Grounded in shape on backend/src/memory/core/traits.rs's trait-plus-impl
// split for storage operations; the COALESCE precedence itself is new,
// built directly from spec.md §4.7's contract (no teacher equivalent).

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::CoreResult;

use super::models::EnabledDocument;

pub struct SelectionService {
    db: PgPool,
}

impl SelectionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// `COALESCE(conversation_override, user_default, TRUE) = TRUE AND NOT
    /// is_deleted`, via a single left-joined query (spec.md §4.7).
    pub async fn get_effective_enabled(
        &self,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> CoreResult<Vec<EnabledDocument>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT d.id, d.resource_hash
            FROM documents d
            LEFT JOIN user_document_defaults udd
                ON udd.document_id = d.id AND udd.user_id = $1
            LEFT JOIN conversation_document_overrides cdo
                ON cdo.document_id = d.id AND cdo.conversation_id = $2
            WHERE NOT d.is_deleted
              AND COALESCE(cdo.enabled, udd.enabled, TRUE)
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(document_id, resource_hash)| EnabledDocument {
                document_id,
                resource_hash,
            })
            .collect())
    }

    pub async fn set_user_document_default(
        &self,
        user_id: &str,
        document_id: Uuid,
        enabled: bool,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_document_defaults (user_id, document_id, enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, document_id) DO UPDATE SET
                enabled = EXCLUDED.enabled, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(document_id)
        .bind(enabled)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Bulk upsert in one statement; conflict always keeps the new value
    /// (spec.md §4.7).
    pub async fn set_user_document_defaults(
        &self,
        user_id: &str,
        overrides: &[(Uuid, bool)],
    ) -> CoreResult<()> {
        if overrides.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO user_document_defaults (user_id, document_id, enabled) ");
        builder.push_values(overrides, |mut b, (document_id, enabled)| {
            b.push_bind(user_id).push_bind(*document_id).push_bind(*enabled);
        });
        builder.push(
            " ON CONFLICT (user_id, document_id) DO UPDATE SET \
              enabled = EXCLUDED.enabled, updated_at = now()",
        );
        builder.build().execute(&self.db).await?;
        Ok(())
    }
}
