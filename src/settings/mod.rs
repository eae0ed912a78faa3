// src/settings/mod.rs
//! Deploy-time bootstrap settings, loaded once at process startup.
//!
//! Grounded on `backend/src/config/mod.rs`'s per-domain-struct composition
//! (`DatabaseConfig`, `ServerConfig`, ... each with their own `from_env()`),
//! generalized to read secrets through [`secret::read_secret`] rather than
//! bare `env::var` so `${NAME}_FILE` indirection works (spec.md §6).
//!
//! This is distinct from [`crate::config`], which is the database-backed
//! runtime configuration service (C4) — this module only carries what's
//! needed to connect to the store and stand the process up in the first
//! place.

pub mod secret;

use secret::{read_secret, read_secret_or};

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn from_env() -> Self {
        Self {
            url: read_secret_or("DATABASE_URL", "postgres://localhost/ragcore"),
            min_connections: read_secret_or("DATABASE_MIN_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            max_connections: read_secret_or("DATABASE_MAX_CONNECTIONS", "20")
                .parse()
                .unwrap_or(20),
            acquire_timeout_secs: read_secret_or("DATABASE_ACQUIRE_TIMEOUT_SECS", "30")
                .parse()
                .unwrap_or(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    /// BYOK_ENCRYPTION_KEY — required to use BYOK features; its absence
    /// disables API-key storage/retrieval with a clear error (spec.md §6).
    pub byok_encryption_key: Option<String>,
    pub session_lifetime_days: i64,
}

impl SecuritySettings {
    pub fn from_env() -> Self {
        Self {
            byok_encryption_key: read_secret("BYOK_ENCRYPTION_KEY"),
            session_lifetime_days: read_secret_or("SESSION_LIFETIME_DAYS", "30")
                .parse()
                .unwrap_or(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval_secs: u64,
    pub reload_interval_secs: u64,
}

impl SchedulerSettings {
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: read_secret_or("SCHEDULER_POLL_INTERVAL_SECS", "1")
                .parse()
                .unwrap_or(1),
            reload_interval_secs: read_secret_or("SCHEDULER_RELOAD_INTERVAL_SECS", "60")
                .parse()
                .unwrap_or(60),
        }
    }
}

/// Top-level settings, composed from domain settings exactly as
/// `MiraConfig` composed `gemini`/`openai`/`server`/... sub-configs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    pub scheduler: SchedulerSettings,
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            database: DatabaseSettings::from_env(),
            security: SecuritySettings::from_env(),
            scheduler: SchedulerSettings::from_env(),
        }
    }
}
