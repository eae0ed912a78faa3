// src/catalog/service.rs
// Document catalog (C5): upsert-by-hash metadata store, substring/filter
// search, and per-conversation enable/disable overrides.
//
// Grounded on backend/src/memory/features/document_processing/storage.rs's
// struct-holding-pool + plain FromRow style, generalized from SQLite to
// Postgres and from a single find_by_hash/store_document pair to the
// fuller upsert + search_metadata contract of spec.md §4.5.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::CoreResult;

use super::models::{Document, DocumentUpsert, SearchMetadataQuery};

const KNOWN_COLUMNS: &[&str] = &[
    "source_type",
    "url",
    "ticket_id",
    "suffix",
    "file_path",
    "original_path",
    "base_path",
    "relative_path",
    "display_name",
];

pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Upsert keyed by `resource_hash`. Does not check that `file_path`
    /// exists on disk — the catalog only tracks metadata (spec.md §4.5).
    pub async fn upsert(&self, input: DocumentUpsert) -> CoreResult<Document> {
        let extra_text = flatten_extra(&input.extra);

        let doc = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (
                resource_hash, file_path, display_name, source_type, url, ticket_id,
                suffix, size_bytes, original_path, base_path, relative_path,
                file_modified_at, ingested_at, extra_json, extra_text
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (resource_hash) DO UPDATE SET
                file_path = EXCLUDED.file_path,
                display_name = EXCLUDED.display_name,
                source_type = EXCLUDED.source_type,
                url = EXCLUDED.url,
                ticket_id = EXCLUDED.ticket_id,
                suffix = EXCLUDED.suffix,
                size_bytes = EXCLUDED.size_bytes,
                original_path = EXCLUDED.original_path,
                base_path = EXCLUDED.base_path,
                relative_path = EXCLUDED.relative_path,
                file_modified_at = EXCLUDED.file_modified_at,
                ingested_at = EXCLUDED.ingested_at,
                extra_json = EXCLUDED.extra_json,
                extra_text = EXCLUDED.extra_text,
                is_deleted = FALSE,
                deleted_at = NULL
            RETURNING *
            "#,
        )
        .bind(&input.resource_hash)
        .bind(&input.file_path)
        .bind(&input.display_name)
        .bind(&input.source_type)
        .bind(&input.url)
        .bind(&input.ticket_id)
        .bind(&input.suffix)
        .bind(input.size_bytes)
        .bind(&input.original_path)
        .bind(&input.base_path)
        .bind(&input.relative_path)
        .bind(input.file_modified_at)
        .bind(input.ingested_at)
        .bind(&input.extra)
        .bind(&extra_text)
        .fetch_one(&self.db)
        .await?;

        Ok(doc)
    }

    /// Returns `None` for an unknown hash rather than an error (spec.md §4.5).
    pub async fn get_by_hash(&self, resource_hash: &str) -> CoreResult<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE resource_hash = $1 AND NOT is_deleted",
        )
        .bind(resource_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(doc)
    }

    pub async fn soft_delete(&self, document_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE documents SET is_deleted = TRUE, deleted_at = now() WHERE id = $1")
            .bind(document_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// `query` matches case-insensitively against display_name, source_type,
    /// url, ticket_id, path columns, and extra_text. `filters` AND within a
    /// group and OR across groups. Ordered by the latest of
    /// file_modified_at/created_at/ingested_at, NULLs last (spec.md §4.5).
    pub async fn search_metadata(&self, q: SearchMetadataQuery) -> CoreResult<Vec<Document>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM documents WHERE NOT is_deleted");

        if let Some(text) = &q.query {
            let pattern = format!("%{text}%");
            builder.push(" AND (");
            builder.push("display_name ILIKE ").push_bind(pattern.clone());
            builder.push(" OR source_type ILIKE ").push_bind(pattern.clone());
            builder.push(" OR url ILIKE ").push_bind(pattern.clone());
            builder.push(" OR ticket_id ILIKE ").push_bind(pattern.clone());
            builder.push(" OR file_path ILIKE ").push_bind(pattern.clone());
            builder.push(" OR original_path ILIKE ").push_bind(pattern.clone());
            builder.push(" OR base_path ILIKE ").push_bind(pattern.clone());
            builder.push(" OR relative_path ILIKE ").push_bind(pattern.clone());
            builder.push(" OR extra_text ILIKE ").push_bind(pattern);
            builder.push(")");
        }

        if !q.filters.is_empty() {
            builder.push(" AND (");
            for (i, group) in q.filters.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push("(");
                for (j, (key, value)) in group.iter().enumerate() {
                    if j > 0 {
                        builder.push(" AND ");
                    }
                    if KNOWN_COLUMNS.contains(&key.as_str()) {
                        builder.push(format!("{key} = "));
                        builder.push_bind(value.clone());
                    } else {
                        builder.push("extra_text ILIKE ");
                        builder.push_bind(format!("%{key}:{value}%"));
                    }
                }
                if group.is_empty() {
                    builder.push("TRUE");
                }
                builder.push(")");
            }
            builder.push(")");
        }

        builder.push(
            " ORDER BY COALESCE(file_modified_at, created_at, ingested_at) DESC NULLS LAST",
        );

        if let Some(limit) = q.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let docs = builder.build_query_as::<Document>().fetch_all(&self.db).await?;
        Ok(docs)
    }

    /// Per-conversation override, upserted; conflict keeps the new value.
    pub async fn set_document_enabled(
        &self,
        conversation_id: &str,
        document_id: Uuid,
        enabled: bool,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_document_overrides (conversation_id, document_id, enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (conversation_id, document_id) DO UPDATE SET
                enabled = EXCLUDED.enabled, updated_at = now()
            "#,
        )
        .bind(conversation_id)
        .bind(document_id)
        .bind(enabled)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn set_documents_enabled(
        &self,
        conversation_id: &str,
        overrides: &[(Uuid, bool)],
    ) -> CoreResult<()> {
        if overrides.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO conversation_document_overrides (conversation_id, document_id, enabled) ",
        );
        builder.push_values(overrides, |mut b, (document_id, enabled)| {
            b.push_bind(conversation_id)
                .push_bind(*document_id)
                .push_bind(*enabled);
        });
        builder.push(
            " ON CONFLICT (conversation_id, document_id) DO UPDATE SET \
              enabled = EXCLUDED.enabled, updated_at = now()",
        );
        builder.build().execute(&self.db).await?;
        Ok(())
    }

    pub async fn get_enabled_hashes(&self, conversation_id: &str) -> CoreResult<Vec<String>> {
        self.hashes_by_override(conversation_id, true).await
    }

    pub async fn get_disabled_hashes(&self, conversation_id: &str) -> CoreResult<Vec<String>> {
        self.hashes_by_override(conversation_id, false).await
    }

    async fn hashes_by_override(&self, conversation_id: &str, enabled: bool) -> CoreResult<Vec<String>> {
        let hashes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT d.resource_hash
            FROM conversation_document_overrides o
            JOIN documents d ON d.id = o.document_id
            WHERE o.conversation_id = $1 AND o.enabled = $2
            "#,
        )
        .bind(conversation_id)
        .bind(enabled)
        .fetch_all(&self.db)
        .await?;
        Ok(hashes)
    }
}

/// Flattens the `extra` JSON object into `key:value value` tokens for
/// substring search (spec.md §4.5). Non-object or non-scalar values are
/// rendered with their JSON string form.
fn flatten_extra(extra: &serde_json::Value) -> String {
    let Some(obj) = extra.as_object() else {
        return String::new();
    };
    obj.iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{k}:{value}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_extra_json_to_tokens() {
        let extra = json!({"ticket": "ABC-1", "priority": 3});
        let text = flatten_extra(&extra);
        assert!(text.contains("ticket:ABC-1"));
        assert!(text.contains("priority:3"));
    }

    #[test]
    fn flattens_empty_for_non_object() {
        assert_eq!(flatten_extra(&json!(null)), "");
    }
}
