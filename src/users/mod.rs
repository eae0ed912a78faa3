// src/users/mod.rs
pub mod models;
pub mod service;

pub use models::{ApiKeyProvider, AuthProvider, Preferences, PreferencesUpdate, User};
pub use service::UserService;
