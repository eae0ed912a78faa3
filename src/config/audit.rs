// src/config/audit.rs
// Append-only change log for dynamic config and user-preference writes
// (spec.md §4.4): "audit writes that fail must not break the functional
// write; they are logged at warning level."

use sqlx::{Postgres, Transaction};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Dynamic,
    UserPref,
}

impl ConfigKind {
    fn as_str(self) -> &'static str {
        match self {
            ConfigKind::Dynamic => "dynamic",
            ConfigKind::UserPref => "user_pref",
        }
    }
}

/// Writes one audit row inside the caller's transaction. Errors are
/// logged and swallowed — the functional write this audits has already
/// succeeded (or is about to commit) and must not be rolled back because
/// the audit log choked.
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Option<&str>,
    kind: ConfigKind,
    field_name: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO config_audit (user_id, config_type, field_name, old_value, new_value)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(field_name)
    .bind(old_value)
    .bind(new_value)
    .execute(&mut **tx)
    .await;

    if let Err(err) = result {
        warn!(%err, field_name, "config audit write failed, continuing");
    }
}
