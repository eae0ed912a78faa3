// src/db/pool.rs
//! Thread-safe bounded connection pool (C1).
//!
//! `sqlx::PgPool` already multiplexes connections internally; this wraps it
//! so the rest of the core sees the `acquire()` / timeout contract spec.md
//! §4.1 describes rather than a raw sqlx type. Grounded in shape on
//! `original_source/src/utils/connection_pool.py` (min/max/timeout fields,
//! `ConnectionTimeoutError` on exhaustion).

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{CoreError, CoreResult};
use crate::settings::DatabaseSettings;

#[derive(Clone)]
pub struct Pool {
    inner: PgPool,
}

impl Pool {
    pub async fn connect(settings: &DatabaseSettings) -> CoreResult<Self> {
        let inner = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await
            .map_err(|e| CoreError::ConnectionPool(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Wrap an already-open pool (used by tests via `#[sqlx::test]`, which
    /// hands out a pre-migrated `PgPool` per test).
    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    /// Acquire a connection, surfacing `ConnectionTimeout` on exhaustion
    /// past the configured acquire timeout (spec.md §4.1).
    pub async fn acquire(&self) -> CoreResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.inner.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => CoreError::ConnectionTimeout,
            sqlx::Error::PoolClosed => CoreError::ConnectionPool("pool closed".into()),
            other => CoreError::Database(other),
        })
    }

    /// Raw handle for services that issue their own queries directly
    /// against a `PgPool` (the common case — sqlx's pool already handles
    /// checkout/checkin per query without an explicit `acquire()`).
    pub fn raw(&self) -> &PgPool {
        &self.inner
    }

    pub async fn close(&self) {
        self.inner.close().await;
    }
}
