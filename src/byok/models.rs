// src/byok/models.rs
// spec.md §4.9 BYOK resolver (C9).

use std::sync::Arc;

use crate::users::{ApiKeyProvider, UserService};

/// BYOK-eligible outbound providers. Anything outside this set (spec.md
/// §4.9: "not a BYOK-supported provider") resolves to `None` unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    OpenRouter,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            "openrouter" => Some(Provider::OpenRouter),
            _ => None,
        }
    }

    pub(crate) fn api_key_provider(self) -> ApiKeyProvider {
        match self {
            Provider::OpenAi => ApiKeyProvider::OpenAi,
            Provider::Anthropic => ApiKeyProvider::Anthropic,
            Provider::OpenRouter => ApiKeyProvider::OpenRouter,
        }
    }
}

/// The per-request identity carried through the `tokio::task_local!`
/// context (spec.md §4.9: "a process-wide context (thread/request-local)
/// carrying `(user_id, user_service_handle)`").
#[derive(Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub user_service: Arc<UserService>,
}
