// src/db/mod.rs
pub mod pool;
pub mod schema;

pub use pool::Pool;
pub use schema::Capabilities;
