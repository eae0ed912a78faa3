// src/selection/models.rs
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EnabledDocument {
    pub document_id: Uuid,
    pub resource_hash: String,
}
