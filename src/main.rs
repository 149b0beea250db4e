use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use evo_sync::config;
use evo_sync::db::{self, SqliteStore};
use evo_sync::evolution::EvolutionClient;
use evo_sync::scheduler::SyncScheduler;
use evo_sync::sync::Reconciler;

#[derive(Debug, Parser)]
#[command(author, version, about = "Keep the local instance table in sync with the Evolution API")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Acting user id (overrides app.user_id)
    #[arg(long)]
    user: Option<String>,

    /// Sync interval in milliseconds (overrides app.sync_interval_ms)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    evo_sync::init_tracing();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let gateway = Arc::new(EvolutionClient::from_config(&cfg)?);
    let store = Arc::new(SqliteStore::new(pool));
    let reconciler = Arc::new(Reconciler::new(
        gateway,
        store,
        cfg.gateway.integration.clone(),
    ));

    let user_id = args.user.unwrap_or_else(|| cfg.app.user_id.clone());
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(cfg.app.sync_interval_ms));

    let mut scheduler = SyncScheduler::new(reconciler);
    scheduler.start(&user_id, interval);

    info!(%user_id, "instance sync running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    scheduler.shutdown().await;
    Ok(())
}
