//! Monster CLI
//!
//! Command-line interface for building and tearing down deployments.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "monster")]
#[command(about = "Multi-node deployment orchestrator", long_about = None)]
struct Cli {
    /// Directory holding the local node records
    #[arg(long, env = "MONSTER_STORE_DIR", default_value = ".monster/records")]
    store_dir: String,

    /// Directory mirroring the management hub's records
    #[arg(long, env = "MONSTER_REMOTE_DIR")]
    remote_dir: Option<String>,

    /// Operating system image of the deployment
    #[arg(long, env = "MONSTER_OS", default_value = "ubuntu")]
    os: String,

    /// Release branch of the deployment
    #[arg(long, env = "MONSTER_BRANCH", default_value = "master")]
    branch: String,

    /// Product being deployed
    #[arg(long, env = "MONSTER_PRODUCT", default_value = "compute")]
    product: String,

    /// Print JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monster_orchestrator=info,monster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        store_dir: cli.store_dir,
        remote_dir: cli.remote_dir,
        os: cli.os,
        branch: cli.branch,
        product: cli.product,
        json: cli.json,
    };

    tracing::debug!("Using record store at {}", config.store_dir);
    handle_command(cli.command, &config).await
}
