// src/auth/mod.rs

pub mod models;
pub mod password;
pub mod service;
pub mod session;

pub use models::{AuthResponse, ChangePasswordRequest, FederatedIdentity, LoginRequest, RegisterRequest};
pub use password::{hash_password, verify_password};
pub use service::AuthService;
pub use session::generate_token;
