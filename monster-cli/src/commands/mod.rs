//! Commands module
//!
//! Defines all CLI commands and their handlers. Every command rebuilds the
//! deployment from the record store before acting on it.

mod deployment;
mod node;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use colored::*;
use monster_core::domain::status::Status;
use monster_orchestrator::{Context, Deployment};
use serde::Serialize;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show a deployment and its nodes
    Show {
        /// Deployment name
        deployment: String,
    },
    /// Run the build pipeline
    Build {
        /// Deployment name
        deployment: String,

        /// Deployment features to attach before building
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// Destroy every node of a deployment
    Destroy {
        /// Deployment name
        deployment: String,
    },
    /// List nodes carrying a feature
    Search {
        /// Deployment name
        deployment: String,
        /// Feature tag
        feature: String,
    },
    /// Collect logs and configuration from every node
    Archive {
        /// Deployment name
        deployment: String,

        /// Package listing command (defaults by OS)
        #[arg(long)]
        list_packages_cmd: Option<String>,
    },
    /// Provision a node and attach features to it
    Provision {
        /// Deployment name
        deployment: String,
        /// Node name without the deployment prefix
        suffix: String,

        /// Address of an existing host to adopt
        #[arg(long)]
        address: Option<String>,

        #[arg(long, default_value = "root")]
        user: String,

        #[arg(long, env = "MONSTER_NODE_PASSWORD", default_value = "")]
        password: String,

        /// Node features to attach
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// Attach features to an existing node
    AddFeatures {
        /// Full node name
        node: String,
        /// Feature tags
        #[arg(required = true)]
        features: Vec<String>,
    },
    /// Append items to a node's run-list
    AddRunList {
        /// Full node name
        node: String,
        /// Run-list items, e.g. role[ha-controller1]
        #[arg(required = true)]
        items: Vec<String>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let ctx = config.context()?;

    match command {
        Commands::Show { deployment } => deployment::show(&ctx, config, &deployment).await,
        Commands::Build {
            deployment,
            features,
        } => deployment::build(&ctx, config, &deployment, &features).await,
        Commands::Destroy { deployment } => deployment::destroy(&ctx, config, &deployment).await,
        Commands::Search {
            deployment,
            feature,
        } => deployment::search(&ctx, config, &deployment, &feature).await,
        Commands::Archive {
            deployment,
            list_packages_cmd,
        } => deployment::archive(&ctx, config, &deployment, list_packages_cmd).await,
        Commands::Provision {
            deployment,
            suffix,
            address,
            user,
            password,
            features,
        } => {
            let connection = address.map(|address| node::login(address, user, password));
            node::provision(&ctx, config, &deployment, &suffix, connection, &features).await
        }
        Commands::AddFeatures { node, features } => {
            node::add_features(&ctx, config, &node, &features).await
        }
        Commands::AddRunList { node, items } => {
            node::add_run_list(&ctx, config, &node, items).await
        }
    }
}

/// Rebuilds a deployment from the record store
async fn load(ctx: &Context, config: &Config, name: &str) -> Result<Deployment> {
    let provisioner = ctx
        .registry
        .provisioner(&ctx.config.default_provisioner)
        .context("Unknown default provisioner")?;

    Deployment::restore(name, config.deployment_params(), provisioner, ctx)
        .await
        .with_context(|| format!("Failed to load deployment {}", name))
}

/// Deployment that owns a node, as recorded in the node's record
async fn owner_of(ctx: &Context, node: &str) -> Result<String> {
    let record = ctx
        .environment
        .record(node)
        .await
        .with_context(|| format!("Node {} not found", node))?;

    record
        .deployment()
        .map(str::to_string)
        .with_context(|| format!("Node {} has no owning deployment recorded", node))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn colorize_status(status: Status) -> ColoredString {
    match status {
        Status::Done | Status::PostBuild => status.as_str().green(),
        Status::Destroying | Status::Destroyed => status.as_str().red(),
        Status::Provisioning => status.as_str().dimmed(),
        _ => status.as_str().yellow(),
    }
}
