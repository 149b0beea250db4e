use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use evo_sync::config;
use evo_sync::db::{self, SqliteStore};
use evo_sync::evolution::{EvolutionClient, ParticipantAction};
use evo_sync::sync::Reconciler;

#[derive(Debug, Parser)]
#[command(author, version, about = "Administer Evolution API instances")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Acting user id (overrides app.user_id)
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the persisted instances
    List,
    /// Create an instance on the gateway
    Create {
        name: String,
        /// Per-instance security token
        #[arg(long)]
        token: Option<String>,
        /// Do not request a QR code on creation
        #[arg(long)]
        no_qrcode: bool,
    },
    /// Delete an instance on the gateway
    Delete { name: String },
    /// Request a QR code / pairing code
    Connect { name: String },
    /// Log the WhatsApp session out
    Logout { name: String },
    /// Restart an instance
    Restart { name: String },
    /// Show the gateway connection state
    State { name: String },
    /// Add, remove, promote or demote group participants
    Participants {
        /// Instance that owns the group
        name: String,
        /// Group JID, e.g. 120363000000@g.us
        #[arg(long)]
        group: String,
        /// add | remove | promote | demote
        #[arg(long)]
        action: ParticipantAction,
        /// Participant JIDs
        #[arg(required = true)]
        participants: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    evo_sync::init_tracing();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let client = Arc::new(EvolutionClient::from_config(&cfg)?);
    let reconciler = Reconciler::new(
        client.clone(),
        Arc::new(SqliteStore::new(pool)),
        cfg.gateway.integration.clone(),
    );
    let user_id = args.user.unwrap_or_else(|| cfg.app.user_id.clone());

    let mutated = match args.command {
        Command::List => {
            for inst in reconciler.get_instances(&user_id).await? {
                println!(
                    "{}\t{}\t{}",
                    inst.instance_name,
                    inst.status.as_str(),
                    inst.profile_name.as_deref().unwrap_or("")
                );
            }
            false
        }
        Command::Create {
            name,
            token,
            no_qrcode,
        } => {
            let created = client
                .create_instance(&name, token.as_deref(), !no_qrcode)
                .await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
            true
        }
        Command::Delete { name } => {
            client.delete_instance(&name).await?;
            info!(instance = %name, "deleted on gateway");
            true
        }
        Command::Connect { name } => {
            let resp = client.connect_instance(&name).await?;
            if let Some(code) = resp.pairing_code.as_deref() {
                println!("pairing code: {}", code);
            }
            if let Some(code) = resp.code.as_deref() {
                println!("qr payload: {}", code);
            }
            false
        }
        Command::Logout { name } => {
            client.logout_instance(&name).await?;
            true
        }
        Command::Restart { name } => {
            client.restart_instance(&name).await?;
            true
        }
        Command::State { name } => {
            let state = client.connection_state(&name).await?;
            println!("{}", state.as_deref().unwrap_or("unknown"));
            false
        }
        Command::Participants {
            name,
            group,
            action,
            participants,
        } => {
            client
                .update_participants(&name, &group, action, &participants)
                .await?;
            info!(instance = %name, %group, action = action.as_str(), count = participants.len(), "participants updated");
            false
        }
    };

    if mutated {
        let result = reconciler.sync_instances_from_api(&user_id).await?;
        if result.success {
            info!(synced = result.synced, "local instance table refreshed");
        } else {
            warn!(errors = ?result.errors, "refresh after change finished with errors");
        }
    }
    Ok(())
}
