use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use evo_sync::config;
use evo_sync::evolution::{EvolutionClient, GatewayService};
use evo_sync::groups::{correct_groups_for_user, resolve_role};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "List an instance's groups with the caller's resolved role in each"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Instance whose groups to fetch
    #[arg(long)]
    instance: String,

    /// Caller JID, e.g. 5511999999999@s.whatsapp.net
    #[arg(long)]
    jid: String,

    /// Print the corrected groups as JSON instead of a role table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    evo_sync::init_tracing();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = EvolutionClient::from_config(&cfg)?;

    let groups = client.fetch_groups(&args.instance, true).await?;
    info!(instance = %args.instance, count = groups.len(), "fetched groups");

    if args.json {
        let corrected = correct_groups_for_user(&args.jid, groups);
        println!("{}", serde_json::to_string_pretty(&corrected)?);
        return Ok(());
    }

    for group in &groups {
        let resolution = resolve_role(&args.jid, group);
        println!(
            "{}\t{}\t{}",
            group.id,
            resolution.role.as_str(),
            group.subject.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
