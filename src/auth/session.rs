// src/auth/session.rs
// Opaque session tokens, replacing the JWT approach in backend/src/auth/jwt.rs.
//
// spec.md's GLOSSARY defines a session token as an opaque string "stored
// server-side" — a JWT can't be revoked on logout, so tokens here are random
// bytes looked up against the `sessions` table instead of self-verifying.

use rand::RngCore;

/// 32 random bytes, base64-url encoded: unguessable and carries no claims.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
