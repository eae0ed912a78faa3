// src/auth/models.rs
// spec.md §4.11 (session-based local/federated authentication).

use serde::{Deserialize, Serialize};

use crate::users::User;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// An already-verified external identity (e.g. GitHub OAuth callback).
/// Authentication happened upstream; this only carries the claims needed
/// to match against a provisioned account.
#[derive(Debug, Deserialize)]
pub struct FederatedIdentity {
    pub github_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    /// Opaque, server-revocable session token (spec.md GLOSSARY: "Session
    /// token" — never a JWT, so logout can actually take effect).
    pub session_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
