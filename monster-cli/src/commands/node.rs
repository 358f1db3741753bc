//! Node command handlers

use anyhow::{Context as _, Result};
use colored::*;
use monster_core::domain::command::Connection;
use monster_orchestrator::Context;

use super::deployment::print_node;
use super::{load, owner_of, print_json};
use crate::config::Config;

pub fn login(address: String, user: String, password: String) -> Connection {
    Connection {
        address,
        user,
        password,
    }
}

/// Provision a node into a deployment
pub async fn provision(
    ctx: &Context,
    config: &Config,
    deployment: &str,
    suffix: &str,
    connection: Option<Connection>,
    features: &[String],
) -> Result<()> {
    let mut deployment_state = load(ctx, config, deployment).await?;
    let node = deployment_state
        .provision_node(suffix, connection, features)
        .await
        .with_context(|| format!("Failed to provision {}-{}", deployment, suffix))?;

    if config.json {
        return print_json(&node.summary());
    }
    println!("{}", format!("✓ Provisioned {}", node.name()).green());
    print_node(&node.summary());
    Ok(())
}

/// Attach features to a node
pub async fn add_features(
    ctx: &Context,
    config: &Config,
    node_name: &str,
    features: &[String],
) -> Result<()> {
    let owner = owner_of(ctx, node_name).await?;
    let mut deployment = load(ctx, config, &owner).await?;
    let node = deployment
        .node_mut(node_name)
        .with_context(|| format!("Node {} not found", node_name))?;

    node.add_features(features)
        .await
        .with_context(|| format!("Failed to add features to {}", node_name))?;

    if config.json {
        return print_json(&node.summary());
    }
    println!(
        "{}",
        format!("✓ {} now has: {}", node_name, node.feature_names().join(", ")).green()
    );
    Ok(())
}

/// Append items to a node's run-list
pub async fn add_run_list(
    ctx: &Context,
    config: &Config,
    node_name: &str,
    items: Vec<String>,
) -> Result<()> {
    let owner = owner_of(ctx, node_name).await?;
    let mut deployment = load(ctx, config, &owner).await?;
    let node = deployment
        .node_mut(node_name)
        .with_context(|| format!("Node {} not found", node_name))?;

    node.add_run_list_item(items)
        .await
        .with_context(|| format!("Failed to update run-list of {}", node_name))?;

    let run_list = node.get_run_list().await?;
    if config.json {
        return print_json(&run_list);
    }
    println!("{}", format!("✓ Run-list of {}:", node_name).green());
    for item in run_list {
        println!("  {}", item);
    }
    Ok(())
}
