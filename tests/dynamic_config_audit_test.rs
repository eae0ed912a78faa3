// tests/dynamic_config_audit_test.rs
// P5: last-writer-wins on the singleton dynamic_config row, with one
// audit row per accepted write carrying matching old/new values
// (spec.md §4.4, §8 P5).

mod common;

use sqlx::PgPool;

use ragcore::config::{DynamicConfigService, DynamicConfigUpdate};

fn no_op_update() -> DynamicConfigUpdate {
    DynamicConfigUpdate {
        active_pipeline: None,
        active_model: None,
        temperature: None,
        max_tokens: None,
        system_prompt: None,
        top_p: None,
        top_k: None,
        repetition_penalty: None,
        active_condense_prompt: None,
        active_chat_prompt: None,
        active_system_prompt: None,
        num_documents_to_retrieve: None,
        use_hybrid_search: None,
        bm25_weight: None,
        semantic_weight: None,
        bm25_k1: None,
        bm25_b: None,
        ingestion_schedule: None,
        verbosity: None,
    }
}

#[sqlx::test]
async fn sequential_writes_are_last_writer_wins_with_matching_audit_rows(pool: PgPool) {
    common::init(&pool).await;
    let config = DynamicConfigService::new(pool.clone());
    config.ensure_row_exists("default", "gpt-4").await.unwrap();

    config
        .update(
            DynamicConfigUpdate { temperature: Some(0.2), ..no_op_update() },
            Some("user-a"),
        )
        .await
        .unwrap();
    let after_first = config.get().await.unwrap();
    assert_eq!(after_first.temperature, 0.2);

    config
        .update(
            DynamicConfigUpdate { temperature: Some(0.9), ..no_op_update() },
            Some("user-b"),
        )
        .await
        .unwrap();
    let after_second = config.get().await.unwrap();
    assert_eq!(after_second.temperature, 0.9);

    let audit_rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT field_name, old_value, new_value FROM config_audit \
         WHERE config_type = 'dynamic' AND field_name = 'temperature' ORDER BY changed_at",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(audit_rows.len(), 2);
    assert_eq!(audit_rows[1].1.as_deref(), Some("0.2"));
    assert_eq!(audit_rows[1].2.as_deref(), Some("0.9"));
}
