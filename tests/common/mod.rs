// tests/common/mod.rs
// Shared setup for integration tests: each test gets an ephemeral database
// (via `#[sqlx::test]`) with the schema already applied.

use sqlx::PgPool;

/// Applies the application schema to a freshly provisioned test database.
/// Call this first in every `#[sqlx::test]` function.
pub async fn init(pool: &PgPool) {
    ragcore::db::schema::init_schema(pool)
        .await
        .expect("schema init failed");
}
