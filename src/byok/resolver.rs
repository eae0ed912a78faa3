// src/byok/resolver.rs
// spec.md §4.9 BYOK resolver (C9).
//
// Grounded on original_source/src/archi/providers/byok_resolver.py's
// resolution order (user key, else environment), with the thread-local
// request context from spec.md §9's design notes mapped onto
// `tokio::task_local!` as the idiomatic async substitute.

use std::sync::Arc;

use tracing::{debug, warn};

use super::models::{Provider, RequestContext};
use crate::users::UserService;

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Runs `f` with `ctx` installed as the ambient request context. Dropping
/// out of this scope restores default environment-key behavior (spec.md
/// §4.9: "clearing the context must restore the default environment-key
/// behavior").
pub async fn with_request_context<F, Fut, T>(ctx: RequestContext, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    REQUEST_CONTEXT.scope(ctx, f()).await
}

fn current_context() -> Option<RequestContext> {
    REQUEST_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

/// Resolves a user's BYOK key for `provider`, looking up the installed
/// request context. Returns `None` if no context is installed, the
/// provider isn't BYOK-eligible, or the user has no key stored — never
/// constructs or caches a client itself (spec.md §4.9: that's left to the
/// outbound client factory, which must build fresh per resolved key).
pub async fn resolve_key(provider: &str) -> Option<String> {
    let Some(provider) = Provider::parse(provider) else {
        debug!(provider, "provider is not BYOK-eligible");
        return None;
    };

    let ctx = current_context()?;
    match ctx
        .user_service
        .get_api_key(&ctx.user_id, provider.api_key_provider())
        .await
    {
        Ok(Some(key)) => Some(key),
        Ok(None) => None,
        Err(err) => {
            warn!(error = %err, "failed to retrieve BYOK key");
            None
        }
    }
}

/// Variant for callers that already hold a `UserService`/`user_id` pair
/// outside the ambient context (e.g. admin tooling, tests).
pub async fn resolve_key_for(
    user_service: &Arc<UserService>,
    user_id: &str,
    provider: &str,
) -> Option<String> {
    let provider = Provider::parse(provider)?;
    match user_service.get_api_key(user_id, provider.api_key_provider()).await {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "failed to retrieve BYOK key");
            None
        }
    }
}
