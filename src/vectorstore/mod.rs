// src/vectorstore/mod.rs
pub mod embedder;
pub mod models;
pub mod service;

pub use embedder::Embedder;
pub use models::{AddTextsInput, Chunk, MetadataFilter, ScoredChunk};
pub use service::VectorStoreService;
