// src/selection/mod.rs
pub mod models;
pub mod service;

pub use models::EnabledDocument;
pub use service::SelectionService;
