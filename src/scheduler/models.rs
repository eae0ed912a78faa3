// src/scheduler/models.rs
// spec.md §4.10/§6 scheduler entities.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

/// A scheduled collector's run outcome future, matching spec.md §6's
/// `callback(last_run?: RFC3339) -> void` contract (fallibly, so failures
/// can be logged before being swallowed).
pub type CollectorFn =
    Arc<dyn Fn(Option<DateTime<Utc>>) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
}

pub(crate) struct Job {
    pub name: String,
    pub cron_expr: String,
    pub schedule: Schedule,
    pub callback: CollectorFn,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub state: JobState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub schedule: String,
    pub state: JobState,
    pub last_run: Option<DateTime<Utc>>,
}

/// Shape of the ingestion status file (spec.md §6): `{ <source_name>:
/// { "schedule": ..., "state": ..., "last_run": ... } }`.
pub type IngestionStatus = HashMap<String, SourceStatus>;
