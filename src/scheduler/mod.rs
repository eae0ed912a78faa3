// src/scheduler/mod.rs
pub mod models;
pub mod service;

pub use models::{CollectorFn, IngestionStatus, JobState, SourceStatus};
pub use service::Scheduler;
