use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use evo_sync::config;
use evo_sync::db::{self, SqliteStore};
use evo_sync::evolution::EvolutionClient;
use evo_sync::sync::Reconciler;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run one instance reconciliation against the Evolution API and print the result"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Acting user id (overrides app.user_id)
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    evo_sync::init_tracing();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let reconciler = Reconciler::new(
        Arc::new(EvolutionClient::from_config(&cfg)?),
        Arc::new(SqliteStore::new(pool)),
        cfg.gateway.integration.clone(),
    );
    let user_id = args.user.unwrap_or_else(|| cfg.app.user_id.clone());

    let result = reconciler.sync_instances_from_api(&user_id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        info!(synced = result.synced, "sync succeeded");
        Ok(())
    } else {
        warn!(errors = result.errors.len(), "sync finished with errors");
        std::process::exit(1);
    }
}
