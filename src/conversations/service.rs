// src/conversations/service.rs
// Conversation/message/A-B-comparison storage (C8).
//
// Grounded on backend/src/memory/storage/sqlite/core.rs's struct-holding-
// pool CRUD style, with exact semantics (conversation_id prefix
// convention, win-rate computation) taken from
// original_source/src/utils/conversation_service.py.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::{CoreError, CoreResult};

use super::models::{
    AbComparison, ConversationSummary, Message, ModelPairAnalytics, NewAbComparison, NewMessage,
};

pub struct ConversationService {
    db: PgPool,
}

impl ConversationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn ensure_conversation(&self, conversation_id: &str, user_id: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_metadata (conversation_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (conversation_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Inserts every message and returns the generated ids in input order
    /// (spec.md §4.8).
    pub async fn insert_messages(
        &self,
        conversation_id: &str,
        messages: &[NewMessage],
    ) -> CoreResult<Vec<i64>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.db.begin().await?;
        let mut ids = Vec::with_capacity(messages.len());

        for message in messages {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO conversation_messages (
                    conversation_id, sender, content, link, context, ts,
                    model_used, pipeline_used, archi_service
                ) VALUES ($1, $2, $3, $4, $5, now(), $6, $7, $8)
                RETURNING message_id
                "#,
            )
            .bind(conversation_id)
            .bind(&message.sender)
            .bind(&message.content)
            .bind(&message.link)
            .bind(&message.context)
            .bind(&message.model_used)
            .bind(&message.pipeline_used)
            .bind(&message.archi_service)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Ascending by `ts` (spec.md §4.8), with `message_id` as a
    /// deterministic tie-break for same-timestamp rows.
    pub async fn get_history(
        &self,
        conversation_id: &str,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, conversation_id, sender, content, link, context, ts,
                   model_used, pipeline_used, archi_service
            FROM conversation_messages
            WHERE conversation_id = $1
            ORDER BY ts ASC, message_id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// `original_source`'s `get_user_conversations` matches ownership via a
    /// `user_<user_id>_` conversation_id prefix, because its conversations
    /// table carries no separate per-conversation owner row. This schema
    /// already models that ownership as `conversation_metadata.user_id`, so
    /// this joins on the real column instead of reintroducing string
    /// matching (spec.md §4.8).
    pub async fn list_user_conversations(
        &self,
        user_id: &str,
        archi_service: &str,
        limit: i64,
    ) -> CoreResult<Vec<ConversationSummary>> {
        let rows: Vec<(String, Option<chrono::DateTime<Utc>>, i64)> = sqlx::query_as(
            r#"
            SELECT m.conversation_id, MAX(m.ts) AS last_message_at, COUNT(*) AS message_count
            FROM conversation_messages m
            JOIN conversation_metadata cm ON cm.conversation_id = m.conversation_id
            WHERE cm.user_id = $1 AND m.archi_service = $2
            GROUP BY m.conversation_id
            ORDER BY last_message_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(archi_service)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(conversation_id, last_message_at, message_count)| ConversationSummary {
                conversation_id,
                last_message_at,
                message_count,
            })
            .collect())
    }

    pub async fn create_ab_comparison(&self, input: NewAbComparison) -> CoreResult<AbComparison> {
        let comparison = sqlx::query_as::<_, AbComparison>(
            r#"
            INSERT INTO ab_comparisons (
                conversation_id, user_prompt_mid, response_a_mid, response_b_mid,
                model_a, pipeline_a, model_b, pipeline_b, is_config_a_first
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&input.conversation_id)
        .bind(input.user_prompt_mid)
        .bind(input.response_a_mid)
        .bind(input.response_b_mid)
        .bind(&input.model_a)
        .bind(&input.pipeline_a)
        .bind(&input.model_b)
        .bind(&input.pipeline_b)
        .bind(input.is_config_a_first)
        .fetch_one(&self.db)
        .await?;
        Ok(comparison)
    }

    pub async fn record_preference(&self, comparison_id: i64, preference: &str) -> CoreResult<()> {
        if !["a", "b", "tie", "skip"].contains(&preference) {
            return Err(CoreError::config_validation(
                "preference",
                format!("must be one of a/b/tie/skip, got '{preference}'"),
            ));
        }

        let updated = sqlx::query(
            "UPDATE ab_comparisons SET preference = $2, preference_ts = now() WHERE comparison_id = $1",
        )
        .bind(comparison_id)
        .bind(preference)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("ab_comparison {comparison_id}")));
        }
        Ok(())
    }

    /// Core does not support deleting a message; deleting a comparison is
    /// permitted and reports whether a row existed (spec.md §4.8).
    pub async fn delete_comparison(&self, comparison_id: i64) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM ab_comparisons WHERE comparison_id = $1")
            .bind(comparison_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Win-rate excludes `skip`/pending from the denominator (spec.md §4.8).
    pub async fn model_pair_analytics(&self) -> CoreResult<Vec<ModelPairAnalytics>> {
        let rows: Vec<(String, String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                model_a, model_b,
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE preference = 'a') AS a_wins,
                COUNT(*) FILTER (WHERE preference = 'b') AS b_wins,
                COUNT(*) FILTER (WHERE preference = 'tie') AS ties
            FROM ab_comparisons
            GROUP BY model_a, model_b
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(model_a, model_b, total, a_wins, b_wins, ties)| ModelPairAnalytics {
                model_a,
                model_b,
                total,
                a_wins,
                b_wins,
                ties,
                a_win_rate: win_rate(a_wins, b_wins, ties),
                b_win_rate: win_rate(b_wins, a_wins, ties),
            })
            .collect())
    }
}

/// `a_wins / (a_wins + b_wins + ties)`, excluding skip/pending from the
/// denominator (spec.md §4.8). Zero when nobody has voted yet.
fn win_rate(a_wins: i64, b_wins: i64, ties: i64) -> f64 {
    let voted = a_wins + b_wins + ties;
    if voted > 0 {
        a_wins as f64 / voted as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_excludes_skip_and_pending_from_denominator() {
        assert_eq!(win_rate(3, 1, 0), 0.75);
    }

    #[test]
    fn win_rate_is_zero_with_no_votes() {
        assert_eq!(win_rate(0, 0, 0), 0.0);
    }
}
