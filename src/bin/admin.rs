// src/bin/admin.rs
// Operator CLI: schema/migration control and scheduler bring-up, grounded
// on crates/mira-server/src/main.rs's clap::Parser + tracing_subscriber
// bring-up style.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragcore::auth::AuthService;
use ragcore::config::{self, DeploymentDescription, StaticConfigCache};
use ragcore::db::{self, Pool};
use ragcore::migrations::MigrationService;
use ragcore::settings::Settings;

#[derive(Parser)]
#[command(name = "ragcore-admin", about = "Operator tooling for the ragcore persistence core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a deployment description (YAML): static config is overwritten,
    /// dynamic config is seeded only if no admin has touched it yet.
    Bootstrap {
        #[arg(long)]
        file: PathBuf,
    },
    /// Report counts/estimates for the pending legacy-store migration without mutating anything.
    MigrateAnalyze,
    /// Run the legacy conversation-schema migration (model_used/pipeline_used backfill).
    MigrateConversations {
        #[arg(long, default_value_t = true)]
        resume: bool,
    },
    /// Drop the legacy `configs` table once all conversations have been migrated.
    MigrateDropConfigs,
    /// Idempotently create or promote an admin account.
    EnsureAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    let pool = Pool::connect(&settings.database).await?;
    db::schema::init_schema(pool.raw()).await?;

    let cli = Cli::parse();
    match cli.command {
        Command::Bootstrap { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let desc: DeploymentDescription = serde_yaml::from_str(&raw)?;
            let statics = StaticConfigCache::bootstrap(pool.raw().clone(), desc.static_config.clone());
            config::initialize_from_deployment(pool.raw(), &statics, &desc).await?;
            info!(file = %file.display(), "deployment description applied");
        }
        Command::MigrateAnalyze => {
            let migrations = MigrationService::new(pool.raw().clone());
            let analysis = migrations.analyze(None, None).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::MigrateConversations { resume } => {
            let migrations = MigrationService::new(pool.raw().clone());
            let stats = migrations.migrate_conversation_schema().await?;
            info!(resume, migrated = stats.migrated, total = stats.total, "conversation schema migration finished");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::MigrateDropConfigs => {
            let migrations = MigrationService::new(pool.raw().clone());
            let result = migrations.drop_configs_table().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::EnsureAdmin { email, password } => {
            let auth = AuthService::new(pool.raw().clone(), settings.security.session_lifetime_days);
            let user = auth.ensure_admin(&email, password.as_deref()).await?;
            info!(email = %user.email.unwrap_or_default(), "admin account ready");
        }
    }

    pool.close().await;
    Ok(())
}
