// tests/byok_roundtrip_test.rs
// P3: set_api_key followed by get_api_key returns the original plaintext;
// no read path without the decryption key yields it (spec.md §4.3, §8 P3).

mod common;

use sqlx::PgPool;

use ragcore::users::{ApiKeyProvider, AuthProvider, UserService};

#[sqlx::test]
async fn roundtrips_through_pgcrypto(pool: PgPool) {
    common::init(&pool).await;
    let users = UserService::new(pool.clone(), Some("test-encryption-key".to_string()));

    let user = users
        .get_or_create(None, AuthProvider::Anonymous, None, None)
        .await
        .unwrap();

    users
        .set_api_key(&user.id, ApiKeyProvider::OpenAi, "sk-the-real-secret")
        .await
        .unwrap();

    let plaintext = users
        .get_api_key(&user.id, ApiKeyProvider::OpenAi)
        .await
        .unwrap();
    assert_eq!(plaintext.as_deref(), Some("sk-the-real-secret"));

    let raw: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT api_key_openai_enc FROM users WHERE id = $1")
            .bind(&user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let raw = raw.expect("ciphertext column should be populated");
    assert!(!raw.is_empty());
    assert!(
        !String::from_utf8_lossy(&raw).contains("sk-the-real-secret"),
        "ciphertext must not contain the plaintext"
    );
}

#[sqlx::test]
async fn refuses_to_store_or_read_without_a_configured_key(pool: PgPool) {
    common::init(&pool).await;
    let users = UserService::new(pool.clone(), None);

    let user = users
        .get_or_create(None, AuthProvider::Anonymous, None, None)
        .await
        .unwrap();

    let set_result = users
        .set_api_key(&user.id, ApiKeyProvider::Anthropic, "sk-whatever")
        .await;
    assert!(set_result.is_err());

    let get_result = users.get_api_key(&user.id, ApiKeyProvider::Anthropic).await;
    assert!(get_result.is_err());
}
