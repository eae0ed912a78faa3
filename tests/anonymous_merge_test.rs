// tests/anonymous_merge_test.rs
// P4: link_anonymous_to_authenticated(a, b) leaves no rows referencing a,
// and preserves every (user_id, document_id) relation unique to a
// (spec.md §4.3, §8 P4).

mod common;

use sqlx::PgPool;
use uuid::Uuid;

use ragcore::catalog::{CatalogService, DocumentUpsert};
use ragcore::selection::SelectionService;
use ragcore::users::{AuthProvider, UserService};

fn upsert(hash: &str) -> DocumentUpsert {
    DocumentUpsert {
        resource_hash: hash.to_string(),
        file_path: format!("/docs/{hash}.txt"),
        display_name: hash.to_string(),
        source_type: "upload".to_string(),
        url: None,
        ticket_id: None,
        suffix: None,
        size_bytes: None,
        original_path: None,
        base_path: None,
        relative_path: None,
        file_modified_at: None,
        ingested_at: None,
        extra: serde_json::json!({}),
    }
}

#[sqlx::test]
async fn merge_rewrites_ownership_and_deletes_the_anonymous_row(pool: PgPool) {
    common::init(&pool).await;
    let users = UserService::new(pool.clone(), None);
    let catalog = CatalogService::new(pool.clone());
    let selection = SelectionService::new(pool.clone());

    let anon = users
        .get_or_create(None, AuthProvider::Anonymous, None, None)
        .await
        .unwrap();
    let doc = catalog.upsert(upsert("shared-doc")).await.unwrap();
    selection
        .set_user_document_default(&anon.id, doc.id, false)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO conversation_metadata (conversation_id, user_id) VALUES ($1, $2)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&anon.id)
    .execute(&pool)
    .await
    .unwrap();

    let auth_id = format!("auth-{}", Uuid::new_v4());
    let merged = users
        .link_anonymous_to_authenticated(
            &anon.id,
            &auth_id,
            AuthProvider::Local,
            Some("Real Name"),
            Some("real@example.com"),
        )
        .await
        .unwrap();
    assert_eq!(merged.id, auth_id);

    let remaining_conversations: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversation_metadata WHERE user_id = $1",
    )
    .bind(&anon.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining_conversations, 0);

    let remaining_defaults: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_document_defaults WHERE user_id = $1",
    )
    .bind(&anon.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(remaining_defaults, 0);

    let anon_still_exists: Option<String> =
        sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(&anon.id)
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(anon_still_exists.is_none());

    let enabled = selection
        .get_effective_enabled(None, Some(&auth_id))
        .await
        .unwrap();
    assert!(!enabled.iter().any(|d| d.document_id == doc.id));
}
