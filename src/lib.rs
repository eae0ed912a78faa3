// src/lib.rs
//! Connection-pooled Postgres+pgvector persistence core for a
//! retrieval-augmented conversational backend.

pub mod auth;
pub mod byok;
pub mod catalog;
pub mod config;
pub mod conversations;
pub mod db;
pub mod error;
pub mod migrations;
pub mod prompts;
pub mod scheduler;
pub mod selection;
pub mod settings;
pub mod users;
pub mod vectorstore;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use auth::AuthService;
use byok::resolver;
use catalog::CatalogService;
use config::{ConfigResolver, DynamicConfigService, StaticConfigCache};
use conversations::ConversationService;
use db::{Capabilities, Pool};
use error::CoreResult;
use migrations::MigrationService;
use prompts::PromptService;
use scheduler::Scheduler;
use selection::SelectionService;
use settings::Settings;
use users::UserService;
use vectorstore::VectorStoreService;

/// Every service the core exposes, wired against one connection pool —
/// the idiomatic analogue of the teacher's `AppState` (spec.md's
/// component design, C1-C11).
#[derive(Clone)]
pub struct Core {
    pub pool: Pool,
    pub capabilities: Capabilities,
    pub users: Arc<UserService>,
    pub auth: Arc<AuthService>,
    pub static_config: Arc<StaticConfigCache>,
    pub dynamic_config: Arc<DynamicConfigService>,
    pub config_resolver: Arc<ConfigResolver>,
    pub catalog: Arc<CatalogService>,
    pub vectorstore: Arc<VectorStoreService>,
    pub selection: Arc<SelectionService>,
    pub conversations: Arc<ConversationService>,
    pub migrations: Arc<MigrationService>,
    pub scheduler: Arc<Scheduler>,
    pub prompts: Arc<PromptService>,
}

impl Core {
    /// Connects the pool, initializes the schema, probes optional
    /// extensions, and wires every service. Call [`Core::close`] on
    /// shutdown to release the pool cleanly.
    pub async fn init(settings: &Settings, prompts_path: PathBuf, ingestion_status_path: Option<PathBuf>) -> CoreResult<Self> {
        let pool = Pool::connect(&settings.database).await?;
        db::schema::init_schema(pool.raw()).await?;
        let capabilities = db::schema::probe_capabilities(pool.raw()).await;

        let users = Arc::new(UserService::new(pool.raw().clone(), settings.security.byok_encryption_key.clone()));
        let auth = Arc::new(AuthService::new(pool.raw().clone(), settings.security.session_lifetime_days));

        let static_config = Arc::new(StaticConfigCache::load(pool.raw().clone()).await?);
        let dynamic_config = Arc::new(DynamicConfigService::new(pool.raw().clone()));
        let config_resolver = Arc::new(ConfigResolver::new(pool.raw().clone()));

        let catalog = Arc::new(CatalogService::new(pool.raw().clone()));
        let vectorstore = Arc::new(VectorStoreService::new(pool.raw().clone(), capabilities, None));
        let selection = Arc::new(SelectionService::new(pool.raw().clone()));
        let conversations = Arc::new(ConversationService::new(pool.raw().clone()));
        let migrations = Arc::new(MigrationService::new(pool.raw().clone()));

        let scheduler = Arc::new(Scheduler::new(
            Duration::from_secs(settings.scheduler.poll_interval_secs),
            Duration::from_secs(settings.scheduler.reload_interval_secs),
            ingestion_status_path,
        ));

        let prompts = Arc::new(PromptService::new(prompts_path));

        info!("core initialized");

        Ok(Self {
            pool,
            capabilities,
            users,
            auth,
            static_config,
            dynamic_config,
            config_resolver,
            catalog,
            vectorstore,
            selection,
            conversations,
            migrations,
            scheduler,
            prompts,
        })
    }

    /// Installs `user_id`/`user_service` as the ambient BYOK request
    /// context for the duration of `f` (spec.md §4.9).
    pub async fn with_byok_context<F, Fut, T>(&self, user_id: String, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        resolver::with_request_context(
            byok::RequestContext { user_id, user_service: self.users.clone() },
            f,
        )
        .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
