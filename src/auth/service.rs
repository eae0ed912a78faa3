// src/auth/service.rs
//
// Grounded on backend/src/auth/service.rs's shape (a struct holding a pool,
// login/register/verify entry points) generalized from SQLite+JWT to
// Postgres+opaque sessions (spec.md §4.11).

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::users::User;

use super::models::{AuthResponse, ChangePasswordRequest, FederatedIdentity, LoginRequest, RegisterRequest};
use super::password::{hash_password, verify_password};
use super::session::generate_token;

pub struct AuthService {
    db: PgPool,
    session_lifetime: Duration,
}

#[derive(sqlx::FromRow)]
struct PasswordRow {
    id: String,
    password_hash: Option<String>,
}

impl AuthService {
    pub fn new(db: PgPool, session_lifetime_days: i64) -> Self {
        Self {
            db,
            session_lifetime: Duration::days(session_lifetime_days),
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> CoreResult<AuthResponse> {
        if req.password.len() < 8 {
            return Err(CoreError::Internal(anyhow!(
                "password must be at least 8 characters"
            )));
        }

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&req.email)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(CoreError::Internal(anyhow!("email already registered")));
        }

        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(&req.password).map_err(CoreError::Internal)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, auth_provider, password_hash)
            VALUES ($1, $2, $3, 'local', $4)
            "#,
        )
        .bind(&id)
        .bind(&req.email)
        .bind(&req.display_name)
        .bind(&password_hash)
        .execute(&self.db)
        .await?;

        self.issue_session(&id).await
    }

    pub async fn login(&self, req: LoginRequest) -> CoreResult<AuthResponse> {
        let row = sqlx::query_as::<_, PasswordRow>(
            "SELECT id, password_hash FROM users WHERE email = $1 AND auth_provider = 'local'",
        )
        .bind(&req.email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(CoreError::Authentication)?;

        let hash = row.password_hash.as_deref().ok_or(CoreError::Authentication)?;
        let ok = verify_password(&req.password, hash).map_err(CoreError::Internal)?;
        if !ok {
            return Err(CoreError::Authentication);
        }

        self.bump_login_stats(&row.id).await?;
        self.issue_session(&row.id).await
    }

    /// Matches an already-verified external identity against a provisioned
    /// account. Unlike `login`/`register`, this never creates a user — an
    /// unmatched identity is rejected (spec.md §4.11: federated login does
    /// not implicitly provision accounts).
    pub async fn federated_callback(&self, identity: FederatedIdentity) -> CoreResult<AuthResponse> {
        let by_github: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE github_id = $1")
                .bind(&identity.github_id)
                .fetch_optional(&self.db)
                .await?;

        let user_id = match by_github {
            Some(id) => id,
            None => {
                let by_email: Option<String> = match &identity.email {
                    Some(email) => {
                        sqlx::query_scalar(
                            "SELECT id FROM users WHERE email = $1 AND auth_provider = 'sso'",
                        )
                        .bind(email)
                        .fetch_optional(&self.db)
                        .await?
                    }
                    None => None,
                };

                match by_email {
                    Some(id) => {
                        sqlx::query("UPDATE users SET github_id = $2 WHERE id = $1")
                            .bind(&id)
                            .bind(&identity.github_id)
                            .execute(&self.db)
                            .await?;
                        id
                    }
                    None => return Err(CoreError::Authentication),
                }
            }
        };

        self.bump_login_stats(&user_id).await?;
        self.issue_session(&user_id).await
    }

    pub async fn change_password(&self, user_id: &str, req: ChangePasswordRequest) -> CoreResult<()> {
        let row = sqlx::query_as::<_, PasswordRow>(
            "SELECT id, password_hash FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?;

        let hash = row.password_hash.as_deref().ok_or(CoreError::Authentication)?;
        if !verify_password(&req.current_password, hash).map_err(CoreError::Internal)? {
            return Err(CoreError::Authentication);
        }
        if req.new_password.len() < 8 {
            return Err(CoreError::Internal(anyhow!(
                "new password must be at least 8 characters"
            )));
        }

        let new_hash = hash_password(&req.new_password).map_err(CoreError::Internal)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&new_hash)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Validates a presented token and returns the owning user, or `None`
    /// if the token is unknown or expired (spec.md §4.11, P6).
    pub async fn validate_session(&self, token: &str) -> CoreResult<Option<User>> {
        let user_id: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        let Some(user_id) = user_id else {
            sqlx::query("DELETE FROM sessions WHERE id = $1 AND expires_at <= now()")
                .bind(token)
                .execute(&self.db)
                .await?;
            return Ok(None);
        };

        let row = sqlx::query_as::<_, crate::users::models::UserRow>(
            "SELECT id, email, display_name, auth_provider, is_admin, login_count, \
             last_login_at, created_at, updated_at, pref_theme, pref_preferred_model, \
             pref_preferred_temperature, pref_preferred_max_tokens, pref_preferred_num_documents, \
             pref_condense_prompt, pref_chat_prompt, pref_system_prompt, pref_preferred_top_p, \
             pref_preferred_top_k \
             FROM users WHERE id = $1",
        )
        .bind(&user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    pub async fn logout(&self, token: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Sweeps expired sessions; intended to run on the scheduler's tick
    /// (spec.md §4.11).
    pub async fn cleanup_expired_sessions(&self) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Idempotently creates or promotes an admin account (spec.md §4.11):
    /// an existing user with `email` is promoted in place; otherwise one
    /// is created with `password` (required in that case) and admin set
    /// from the start.
    pub async fn ensure_admin(&self, email: &str, password: Option<&str>) -> CoreResult<User> {
        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        let user_id = match existing {
            Some(id) => {
                sqlx::query("UPDATE users SET is_admin = TRUE WHERE id = $1")
                    .bind(&id)
                    .execute(&self.db)
                    .await?;
                id
            }
            None => {
                let password = password.ok_or_else(|| {
                    CoreError::Internal(anyhow!("password is required to create a new admin account"))
                })?;
                let id = Uuid::new_v4().to_string();
                let password_hash = hash_password(password).map_err(CoreError::Internal)?;
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, auth_provider, password_hash, is_admin)
                    VALUES ($1, $2, 'local', $3, TRUE)
                    "#,
                )
                .bind(&id)
                .bind(email)
                .bind(&password_hash)
                .execute(&self.db)
                .await?;
                id
            }
        };

        let row = sqlx::query_as::<_, crate::users::models::UserRow>(
            "SELECT id, email, display_name, auth_provider, is_admin, login_count, \
             last_login_at, created_at, updated_at, pref_theme, pref_preferred_model, \
             pref_preferred_temperature, pref_preferred_max_tokens, pref_preferred_num_documents, \
             pref_condense_prompt, pref_chat_prompt, pref_system_prompt, pref_preferred_top_p, \
             pref_preferred_top_k \
             FROM users WHERE id = $1",
        )
        .bind(&user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    async fn bump_login_stats(&self, user_id: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE users SET login_count = login_count + 1, last_login_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn issue_session(&self, user_id: &str) -> CoreResult<AuthResponse> {
        let token = generate_token();
        let expires_at: DateTime<Utc> = Utc::now() + self.session_lifetime;

        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        let row = sqlx::query_as::<_, crate::users::models::UserRow>(
            "SELECT id, email, display_name, auth_provider, is_admin, login_count, \
             last_login_at, created_at, updated_at, pref_theme, pref_preferred_model, \
             pref_preferred_temperature, pref_preferred_max_tokens, pref_preferred_num_documents, \
             pref_condense_prompt, pref_chat_prompt, pref_system_prompt, pref_preferred_top_p, \
             pref_preferred_top_k \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let user: User = row.into();

        Ok(AuthResponse {
            user,
            session_token: token,
            expires_at,
        })
    }
}
