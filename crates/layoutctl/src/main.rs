mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Once;

use admin_client::{AdminConfig, HttpAdminClient};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::ZoneRedundancy;
use layout_engine::Capacity;
use orchestrator::{LayoutError, LayoutOrchestrator};
use tracing_subscriber::EnvFilter;

use crate::commands::AssignArgs;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format =
            std::env::var("LAYOUTCTL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_writer(io::stderr)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_writer(io::stderr)
                .compact()
                .init();
        }
    });
}

#[derive(Parser)]
#[command(name = "layoutctl")]
#[command(about = "Inspect and stage cluster layout changes", long_about = None)]
struct Cli {
    /// Admin API endpoint, e.g. http://127.0.0.1:3903
    #[arg(long, global = true, env = "LAYOUTCTL_ENDPOINT")]
    endpoint: Option<String>,
    /// Bearer token for the admin API
    #[arg(long, global = true, env = "LAYOUTCTL_ADMIN_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// YAML file with endpoint, admin_token and timeout_secs
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cluster members with their effective role
    Status,
    /// Show the committed layout and any staged changes
    Layout,
    /// List zones known to the cluster, staged ones included
    Zones,
    /// List tags known to the cluster, staged ones included
    Tags,
    /// Stage a role for a node
    Assign {
        /// Node id or unique id prefix
        #[arg(long)]
        node: String,
        #[arg(long)]
        zone: Option<String>,
        /// Storage capacity, e.g. 500GB or 2TB
        #[arg(long, conflicts_with = "gateway")]
        capacity: Option<Capacity>,
        /// Assign a gateway role with no storage capacity
        #[arg(long)]
        gateway: bool,
        /// Tag to attach; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// `maximum` or a minimum zone count
        #[arg(long)]
        redundancy: Option<ZoneRedundancy>,
    },
    /// Stage the removal of a node's role
    Remove {
        #[arg(long)]
        node: String,
    },
    /// Commit staged changes
    Apply {
        /// Layout version the changes were staged against
        #[arg(long)]
        version: Option<u64>,
    },
    /// Discard staged changes
    Revert {
        #[arg(long)]
        version: Option<u64>,
    },
    /// Connect the cluster to a peer given as <node_id>@<addr>
    Connect { peer: String },
}

fn load_config(cli: &Cli) -> Result<AdminConfig> {
    let mut config = match &cli.config {
        Some(path) => AdminConfig::from_yaml_file(path)?,
        None => AdminConfig::default(),
    }
    .merge_env()?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(token) = &cli.token {
        config.admin_token = Some(token.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "resolved admin config");
    let client = HttpAdminClient::new(&config).context("failed to set up admin client")?;
    let orch = LayoutOrchestrator::new(client);
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Status => commands::status(&orch, &mut out).await,
        Commands::Layout => commands::layout(&orch, &mut out).await,
        Commands::Zones => commands::zones(&orch, &mut out).await,
        Commands::Tags => commands::tags(&orch, &mut out).await,
        Commands::Assign {
            node,
            zone,
            capacity,
            gateway,
            tags,
            redundancy,
        } => {
            let args = AssignArgs {
                node,
                zone,
                capacity,
                gateway,
                tags,
                redundancy,
            };
            commands::assign(&orch, args, &mut out).await
        }
        Commands::Remove { node } => commands::remove(&orch, &node, &mut out).await,
        Commands::Apply { version } => commands::apply(&orch, version, &mut out).await,
        Commands::Revert { version } => commands::revert(&orch, version, &mut out).await,
        Commands::Connect { peer } => commands::connect(&orch, &peer, &mut out).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<LayoutError>() {
                Some(layout_err) => eprintln!("{}: {}", layout_err.kind(), layout_err.message()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
