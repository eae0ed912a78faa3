// src/migrations/mod.rs
pub mod legacy;
pub mod models;
pub mod service;

pub use legacy::{LegacyCatalogRow, LegacyCatalogSource, LegacyVector, LegacyVectorSource};
pub use models::{
    DropConfigsResult, MigrationAnalysis, MigrationCheckpoint, MigrationState, MigrationStats,
    MigrationStatusKind,
};
pub use service::{MigrationService, BATCH_SIZE_CONVERSATIONS, BATCH_SIZE_DOCUMENTS, BATCH_SIZE_VECTORS};
