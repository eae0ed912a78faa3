// src/byok/mod.rs
pub mod models;
pub mod resolver;

pub use models::{Provider, RequestContext};
pub use resolver::{resolve_key, resolve_key_for, with_request_context};
