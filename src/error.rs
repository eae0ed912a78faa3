// src/error.rs
// Core error taxonomy, grounded on backend/src/git/error.rs's closed-enum +
// anyhow-interop style.

use thiserror::Error;

/// Errors raised by the persistence/retrieval core.
///
/// Mutating entry points return this type so callers can match on `kind()`
/// and translate it into a transport-specific status (the HTTP layer, out
/// of scope here, is expected to map `ConnectionTimeout` -> 503,
/// `ConfigValidation`/`Configuration` -> 400, `Authentication` -> 401/403).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid value for '{field}': {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("timed out acquiring a connection from the pool")]
    ConnectionTimeout,

    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    #[error("authentication failed")]
    Authentication,

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("migration blocked: {0}")]
    MigrationBlocked(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("required capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Machine-readable discriminant for mutating-endpoint error bodies
    /// (spec.md §7: "all mutating endpoints return a structured error with
    /// a machine-readable `kind`").
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ConfigValidation { .. } => "config_validation",
            CoreError::ConnectionTimeout => "connection_timeout",
            CoreError::ConnectionPool(_) => "connection_pool",
            CoreError::Authentication => "authentication",
            CoreError::PromptNotFound(_) => "prompt_not_found",
            CoreError::Configuration(_) => "configuration",
            CoreError::MigrationBlocked(_) => "migration_blocked",
            CoreError::NotFound(_) => "not_found",
            CoreError::CapabilityUnavailable(_) => "capability_unavailable",
            CoreError::Database(_) => "database",
            CoreError::Internal(_) => "internal",
        }
    }

    pub fn config_validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
