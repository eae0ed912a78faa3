// src/db/schema.rs
//! Physical schema (C2): tables, indexes, and required extensions.
//!
//! Schema initialization is a single deterministic SQL script (spec.md §6).
//! Kept as one `const` string rather than split per-table migration files
//! because the store here owns its whole schema outright (no incremental
//! migrations beyond the resumable legacy-import in [`crate::migrations`]).

use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::CoreResult;

/// `CREATE EXTENSION` + table/index DDL. Idempotent: every statement is
/// `IF NOT EXISTS`.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Runs [`SCHEMA_SQL`] against `pool`. Safe to call on every startup.
pub async fn init_schema(pool: &PgPool) -> CoreResult<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    info!("schema initialized");
    Ok(())
}

/// Capability flags for optional extensions, probed once at startup per
/// the "graceful degradation when an optional extension is missing"
/// redesign note (spec.md §9): consumers branch on the flag rather than
/// catching a query failure on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Whether a BM25-scoring full-text operator (e.g. ParadeDB's
    /// `pg_search` extension) is installed. When false, hybrid search
    /// falls back to semantic-only (spec.md §4.6, §8 scenario 4).
    pub bm25: bool,
}

pub async fn probe_capabilities(pool: &PgPool) -> Capabilities {
    let bm25: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'pg_search')",
    )
    .fetch_one(pool)
    .await
    .unwrap_or_else(|err| {
        warn!(%err, "failed to probe for pg_search extension; assuming BM25 unavailable");
        false
    });

    if !bm25 {
        warn!("pg_search (BM25) extension not found; hybrid_search will fall back to semantic-only");
    }

    Capabilities { bm25 }
}
