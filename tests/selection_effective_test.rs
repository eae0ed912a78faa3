// tests/selection_effective_test.rs
// P1: COALESCE(conversation_override, user_default, TRUE) precedence for
// document selection (spec.md §4.7, §8 P1).

mod common;

use sqlx::PgPool;

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
async fn defaults_to_enabled_with_no_overrides(pool: PgPool) {
    common::init(&pool).await;
    let catalog = CatalogService::new(pool.clone());
    let selection = SelectionService::new(pool.clone());

    let doc = catalog.upsert(upsert("doc-a")).await.unwrap();

    let enabled = selection.get_effective_enabled(None, None).await.unwrap();
    assert!(enabled.iter().any(|d| d.document_id == doc.id));
}

#[sqlx::test]
async fn user_default_overrides_system_default(pool: PgPool) {
    common::init(&pool).await;
    let catalog = CatalogService::new(pool.clone());
    let users = UserService::new(pool.clone(), None);
    let selection = SelectionService::new(pool.clone());

    let doc = catalog.upsert(upsert("doc-b")).await.unwrap();
    let user = users
        .get_or_create(None, AuthProvider::Anonymous, None, None)
        .await
        .unwrap();

    selection
        .set_user_document_default(&user.id, doc.id, false)
        .await
        .unwrap();

    let enabled = selection
        .get_effective_enabled(None, Some(&user.id))
        .await
        .unwrap();
    assert!(!enabled.iter().any(|d| d.document_id == doc.id));

    // No user context: system default (TRUE) still applies.
    let enabled_no_user = selection.get_effective_enabled(None, None).await.unwrap();
    assert!(enabled_no_user.iter().any(|d| d.document_id == doc.id));
}

#[sqlx::test]
async fn conversation_override_beats_user_default(pool: PgPool) {
    common::init(&pool).await;
    let catalog = CatalogService::new(pool.clone());
    let users = UserService::new(pool.clone(), None);
    let selection = SelectionService::new(pool.clone());

    let doc = catalog.upsert(upsert("doc-c")).await.unwrap();
    let user = users
        .get_or_create(None, AuthProvider::Anonymous, None, None)
        .await
        .unwrap();
    selection
        .set_user_document_default(&user.id, doc.id, false)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO conversation_document_overrides (conversation_id, document_id, enabled) \
         VALUES ($1, $2, TRUE)",
    )
    .bind("conv-1")
    .bind(doc.id)
    .execute(&pool)
    .await
    .unwrap();

    let enabled = selection
        .get_effective_enabled(Some("conv-1"), Some(&user.id))
        .await
        .unwrap();
    assert!(enabled.iter().any(|d| d.document_id == doc.id));
}
