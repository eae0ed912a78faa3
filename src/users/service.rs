// src/users/service.rs
// User identity, preferences, and BYOK key storage (C3).
//
// Grounded on backend/src/auth/service.rs: a plain struct holding a pool,
// `sqlx::query`/`query_as` calls bound positionally, upsert-by-id helpers.

use chrono::Utc;
use rand::RngCore;
use sqlx::PgPool;

use crate::config::audit::{self, ConfigKind};
use crate::error::{CoreError, CoreResult};

use super::models::{ApiKeyProvider, AuthProvider, Preferences, PreferencesUpdate, User, UserRow};

pub struct UserService {
    db: PgPool,
    /// `BYOK_ENCRYPTION_KEY`; `None` disables BYOK storage entirely
    /// (spec.md §6).
    encryption_key: Option<String>,
}

const USER_COLUMNS: &str = "id, email, display_name, auth_provider, is_admin, login_count, \
    last_login_at, created_at, updated_at, pref_theme, pref_preferred_model, \
    pref_preferred_temperature, pref_preferred_max_tokens, pref_preferred_num_documents, \
    pref_condense_prompt, pref_chat_prompt, pref_system_prompt, pref_preferred_top_p, \
    pref_preferred_top_k";

impl UserService {
    pub fn new(db: PgPool, encryption_key: Option<String>) -> Self {
        Self { db, encryption_key }
    }

    fn synthesize_anon_id() -> String {
        let mut bytes = [0u8; 12];
        rand::rng().fill_bytes(&mut bytes);
        format!("anon_{}", hex::encode(bytes))
    }

    /// Lazily creates a user on first interaction, or returns the existing
    /// row unchanged — preferences/keys are never clobbered by a second
    /// `get_or_create` call (spec.md §4.3).
    pub async fn get_or_create(
        &self,
        id: Option<&str>,
        auth_provider: AuthProvider,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> CoreResult<User> {
        if let Some(id) = id {
            if let Some(existing) = self.get(id).await? {
                return Ok(existing);
            }
        }

        let id = id
            .map(str::to_string)
            .unwrap_or_else(Self::synthesize_anon_id);
        let provider_str = match auth_provider {
            AuthProvider::Anonymous => "anonymous",
            AuthProvider::Local => "local",
            AuthProvider::Sso => "sso",
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, auth_provider)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(display_name)
        .bind(provider_str)
        .execute(&self.db)
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("user insert did not round-trip")))
    }

    pub async fn get(&self, id: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Writes every provided preference field and appends one
    /// `ConfigAudit` row per changed field, mirroring
    /// `DynamicConfigService::update`'s diff-then-audit pattern (spec.md
    /// §4.4: every successful write to dynamic or user-preference state
    /// appends a row to `ConfigAudit`).
    pub async fn update_preferences(&self, id: &str, update: PreferencesUpdate) -> CoreResult<User> {
        let before = self
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE users SET
                pref_theme = COALESCE($2, pref_theme),
                pref_preferred_model = COALESCE($3, pref_preferred_model),
                pref_preferred_temperature = COALESCE($4, pref_preferred_temperature),
                pref_preferred_max_tokens = COALESCE($5, pref_preferred_max_tokens),
                pref_preferred_num_documents = COALESCE($6, pref_preferred_num_documents),
                pref_condense_prompt = COALESCE($7, pref_condense_prompt),
                pref_chat_prompt = COALESCE($8, pref_chat_prompt),
                pref_system_prompt = COALESCE($9, pref_system_prompt),
                pref_preferred_top_p = COALESCE($10, pref_preferred_top_p),
                pref_preferred_top_k = COALESCE($11, pref_preferred_top_k),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.theme)
        .bind(&update.preferred_model)
        .bind(update.preferred_temperature)
        .bind(update.preferred_max_tokens)
        .bind(update.preferred_num_documents)
        .bind(&update.preferred_condense_prompt)
        .bind(&update.preferred_chat_prompt)
        .bind(&update.preferred_system_prompt)
        .bind(update.preferred_top_p)
        .bind(update.preferred_top_k)
        .execute(&mut *tx)
        .await?;

        for (field, old, new) in changed_preference_fields(&before.preferences, &update) {
            audit::record(&mut tx, Some(id), ConfigKind::UserPref, field, old.as_deref(), new.as_deref()).await;
        }

        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
    }

    /// Encrypts `plaintext` with the deployment key via pgcrypto's
    /// `pgp_sym_encrypt` and stores it; fails with `Configuration` if no
    /// key is configured (spec.md §4.3, §6).
    pub async fn set_api_key(
        &self,
        id: &str,
        provider: ApiKeyProvider,
        plaintext: &str,
    ) -> CoreResult<()> {
        let key = self
            .encryption_key
            .as_ref()
            .ok_or_else(|| CoreError::Configuration("BYOK_ENCRYPTION_KEY is not configured".into()))?;

        let column = provider.column();
        let sql = format!(
            "UPDATE users SET {column} = pgp_sym_encrypt($2, $3), updated_at = now() WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(plaintext)
            .bind(key)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Decrypts inside the database using the deployment key; returns
    /// `None` if unset (spec.md §4.3). Returns `Configuration` if no key
    /// is configured, since plaintext can never be produced without one.
    pub async fn get_api_key(&self, id: &str, provider: ApiKeyProvider) -> CoreResult<Option<String>> {
        let key = self
            .encryption_key
            .as_ref()
            .ok_or_else(|| CoreError::Configuration("BYOK_ENCRYPTION_KEY is not configured".into()))?;

        let column = provider.column();
        let sql = format!(
            "SELECT pgp_sym_decrypt({column}, $2) FROM users WHERE id = $1 AND {column} IS NOT NULL"
        );
        let plaintext: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(key)
            .fetch_optional(&self.db)
            .await?
            .flatten();

        Ok(plaintext)
    }

    /// Merges an anonymous identity into an authenticated one: preferences
    /// and keys are COALESCE-merged (authenticated wins), conversation and
    /// document-default ownership is rewritten, and the anonymous row is
    /// deleted — all in one transaction (spec.md §4.3, P4).
    pub async fn link_anonymous_to_authenticated(
        &self,
        anon_id: &str,
        auth_id: &str,
        auth_provider: AuthProvider,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> CoreResult<User> {
        let mut tx = self.db.begin().await?;

        let provider_str = match auth_provider {
            AuthProvider::Anonymous => "anonymous",
            AuthProvider::Local => "local",
            AuthProvider::Sso => "sso",
        };

        // Ensure the authenticated user exists before merging into it.
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, auth_provider)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(auth_id)
        .bind(email)
        .bind(display_name)
        .bind(provider_str)
        .execute(&mut *tx)
        .await?;

        // COALESCE-merge preferences and keys — existing authenticated
        // values win over the anonymous user's.
        sqlx::query(
            r#"
            UPDATE users AS dst SET
                pref_theme = COALESCE(dst.pref_theme, src.pref_theme),
                pref_preferred_model = COALESCE(dst.pref_preferred_model, src.pref_preferred_model),
                pref_preferred_temperature = COALESCE(dst.pref_preferred_temperature, src.pref_preferred_temperature),
                pref_preferred_max_tokens = COALESCE(dst.pref_preferred_max_tokens, src.pref_preferred_max_tokens),
                pref_preferred_num_documents = COALESCE(dst.pref_preferred_num_documents, src.pref_preferred_num_documents),
                pref_condense_prompt = COALESCE(dst.pref_condense_prompt, src.pref_condense_prompt),
                pref_chat_prompt = COALESCE(dst.pref_chat_prompt, src.pref_chat_prompt),
                pref_system_prompt = COALESCE(dst.pref_system_prompt, src.pref_system_prompt),
                pref_preferred_top_p = COALESCE(dst.pref_preferred_top_p, src.pref_preferred_top_p),
                pref_preferred_top_k = COALESCE(dst.pref_preferred_top_k, src.pref_preferred_top_k),
                api_key_openrouter_enc = COALESCE(dst.api_key_openrouter_enc, src.api_key_openrouter_enc),
                api_key_openai_enc = COALESCE(dst.api_key_openai_enc, src.api_key_openai_enc),
                api_key_anthropic_enc = COALESCE(dst.api_key_anthropic_enc, src.api_key_anthropic_enc),
                updated_at = now()
            FROM users AS src
            WHERE dst.id = $2 AND src.id = $1
            "#,
        )
        .bind(anon_id)
        .bind(auth_id)
        .execute(&mut *tx)
        .await?;

        // Rewrite ownership. Document-default rows keep the existing
        // authenticated row on conflict (P4: no duplicate (user_id,
        // document_id) pair is created).
        sqlx::query("UPDATE conversation_metadata SET user_id = $2 WHERE user_id = $1")
            .bind(anon_id)
            .bind(auth_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_document_defaults (user_id, document_id, enabled, updated_at)
            SELECT $2, document_id, enabled, updated_at
            FROM user_document_defaults
            WHERE user_id = $1
            ON CONFLICT (user_id, document_id) DO NOTHING
            "#,
        )
        .bind(anon_id)
        .bind(auth_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM user_document_defaults WHERE user_id = $1")
            .bind(anon_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(anon_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(auth_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {auth_id}")))
    }
}

/// Diffs only the fields `update` actually touches against `before`,
/// mirroring `config::dynamic::changed_fields` (spec.md §4.4).
fn changed_preference_fields(
    before: &Preferences,
    update: &PreferencesUpdate,
) -> Vec<(&'static str, Option<String>, Option<String>)> {
    let mut out = Vec::new();
    macro_rules! diff {
        ($name:literal, $field:ident) => {
            if let Some(new) = &update.$field {
                let old = before.$field.as_ref().map(|v| v.to_string());
                let new_s = Some(new.to_string());
                if old != new_s {
                    out.push(($name, old, new_s));
                }
            }
        };
    }

    diff!("theme", theme);
    diff!("preferred_model", preferred_model);
    diff!("preferred_temperature", preferred_temperature);
    diff!("preferred_max_tokens", preferred_max_tokens);
    diff!("preferred_num_documents", preferred_num_documents);
    diff!("preferred_condense_prompt", preferred_condense_prompt);
    diff!("preferred_chat_prompt", preferred_chat_prompt);
    diff!("preferred_system_prompt", preferred_system_prompt);
    diff!("preferred_top_p", preferred_top_p);
    diff!("preferred_top_k", preferred_top_k);

    out
}
