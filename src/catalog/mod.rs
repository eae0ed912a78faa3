// src/catalog/mod.rs
pub mod models;
pub mod service;

pub use models::{Document, DocumentUpsert, FilterGroup, SearchMetadataQuery};
pub use service::CatalogService;
