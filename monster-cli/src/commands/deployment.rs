//! Deployment command handlers

use anyhow::{Context as _, Result};
use colored::*;
use monster_core::dto::{DeploymentSummary, NodeSummary};
use monster_orchestrator::{ArchivePlan, Context};

use super::{colorize_status, load, print_json};
use crate::config::Config;

/// Show a deployment
pub async fn show(ctx: &Context, config: &Config, name: &str) -> Result<()> {
    let deployment = load(ctx, config, name).await?;
    let summary = deployment.summary();

    if config.json {
        return print_json(&summary);
    }

    if summary.nodes.is_empty() {
        println!("{}", format!("No nodes found for {}.", name).yellow());
    } else {
        print_deployment(&summary);
    }
    Ok(())
}

/// Attach features and run the build pipeline
pub async fn build(ctx: &Context, config: &Config, name: &str, features: &[String]) -> Result<()> {
    let mut deployment = load(ctx, config, name).await?;
    deployment
        .add_features(features)
        .context("Failed to attach deployment features")?;

    println!("{}", format!("Building {}...", name).bold());
    let result = deployment.build().await;

    if config.json {
        print_json(&deployment.summary())?;
    } else {
        print_deployment(&deployment.summary());
    }

    result.with_context(|| format!("Build of {} failed at {}", name, deployment.status()))?;
    println!("{}", "✓ Build complete".green());
    Ok(())
}

/// Destroy every node of a deployment
pub async fn destroy(ctx: &Context, config: &Config, name: &str) -> Result<()> {
    let mut deployment = load(ctx, config, name).await?;
    let count = deployment.nodes().len();

    deployment
        .destroy()
        .await
        .with_context(|| format!("Failed to destroy {}", name))?;

    if config.json {
        return print_json(&deployment.summary());
    }
    println!("{}", format!("✓ Destroyed {} node(s) of {}", count, name).green());
    Ok(())
}

/// List nodes with a feature
pub async fn search(ctx: &Context, config: &Config, name: &str, feature: &str) -> Result<()> {
    let deployment = load(ctx, config, name).await?;
    let nodes: Vec<NodeSummary> = deployment.search_role(feature).map(|node| node.summary()).collect();

    if config.json {
        return print_json(&nodes);
    }

    if nodes.is_empty() {
        println!("{}", format!("No {} nodes in {}.", feature, name).yellow());
    } else {
        println!("{}", format!("Found {} {} node(s):", nodes.len(), feature).bold());
        println!();
        for node in &nodes {
            print_node(node);
        }
    }
    Ok(())
}

/// Collect archives from every node
pub async fn archive(
    ctx: &Context,
    config: &Config,
    name: &str,
    list_packages_cmd: Option<String>,
) -> Result<()> {
    let mut deployment = load(ctx, config, name).await?;
    let plan = ArchivePlan::new(
        list_packages_cmd.unwrap_or_else(|| config.list_packages_cmd().to_string()),
    );

    deployment
        .artifact(&plan)
        .await
        .with_context(|| format!("Failed to archive {}", name))?;

    println!(
        "{}",
        format!("✓ Archived {} into {} on each node", name, plan.misc_path).green()
    );
    Ok(())
}

fn print_deployment(summary: &DeploymentSummary) {
    println!("{}", "Deployment Details:".bold());
    println!("  Name:        {}", summary.name.cyan());
    println!("  OS:          {}", summary.os);
    println!("  Branch:      {}", summary.branch);
    println!("  Product:     {}", summary.product);
    println!("  Provisioner: {}", summary.provisioner.dimmed());
    println!("  Status:      {}", colorize_status(summary.status));
    if !summary.features.is_empty() {
        println!("  Features:    {}", summary.features.join(", "));
    }

    println!("\n{}", format!("Nodes ({}):", summary.nodes.len()).bold());
    for node in &summary.nodes {
        print_node(node);
    }
}

pub(super) fn print_node(node: &NodeSummary) {
    println!("  {} {}", "▸".cyan(), node.name);
    println!("    Address:  {}", node.address.dimmed());
    println!("    Status:   {}", colorize_status(node.status));
    println!("    Features: {}", node.features.join(", "));
    if !node.run_list.is_empty() {
        println!("    Run-list: {}", node.run_list.join(", ").dimmed());
    }
    println!();
}
