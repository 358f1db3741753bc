//! Features
//!
//! A feature is a named capability attached to a node or a deployment. The
//! build pipeline calls its lifecycle hooks; every hook defaults to a no-op
//! so a feature implements only what it needs.
//!
//! Features never own what they are attached to. `owner()` names it, and
//! hooks receive a borrowed view of it for the duration of the call: a node
//! feature gets the node's [`Host`], a deployment feature gets a
//! [`DeploymentScope`].
//!
//! The lowercase `name()` is the feature's identity. It is used for
//! membership tests, persisted in archive records, and resolved through the
//! [`CapabilityRegistry`](crate::registry::CapabilityRegistry) on restore.

mod deployment;
mod node;

pub use deployment::{DeploymentFeatureKind, KeystoneFeature, NeutronFeature, OpenStackFeature};
pub use node::{CHEF_SERVER, ChefServerFeature, NodeFeatureKind, RoleFeature};

use async_trait::async_trait;

use crate::deployment::DeploymentScope;
use crate::error::Result;
use crate::node::Host;

/// Feature attached to a node
#[async_trait]
pub trait NodeFeature: Send + Sync {
    /// Lowercase capability tag
    fn name(&self) -> &str;

    /// Name of the node this feature is attached to
    fn owner(&self) -> &str;

    /// Runs before the node applies its features
    async fn pre_configure(&self, _host: &mut Host) -> Result<()> {
        Ok(())
    }

    /// Runs after the node's management hub client run
    async fn apply_feature(&self, _host: &mut Host) -> Result<()> {
        Ok(())
    }

    async fn post_configure(&self, _host: &mut Host) -> Result<()> {
        Ok(())
    }

    /// Collects logs and configuration for this feature
    async fn archive(&self, _host: &mut Host, _plan: &ArchivePlan) -> Result<()> {
        Ok(())
    }
}

/// Feature attached to a deployment
#[async_trait]
pub trait DeploymentFeature: Send + Sync {
    /// Lowercase capability tag
    fn name(&self) -> &str;

    /// Name of the deployment this feature is attached to
    fn owner(&self) -> &str;

    /// Contributes settings to the deployment environment
    ///
    /// Features run in attachment order, so contributions of earlier
    /// features are visible to later ones.
    async fn update_environment(&self, _scope: &mut DeploymentScope<'_>) -> Result<()> {
        Ok(())
    }

    async fn pre_configure(&self, _scope: &mut DeploymentScope<'_>) -> Result<()> {
        Ok(())
    }

    async fn post_configure(&self, _scope: &mut DeploymentScope<'_>) -> Result<()> {
        Ok(())
    }

    async fn archive(&self, _scope: &mut DeploymentScope<'_>, _plan: &ArchivePlan) -> Result<()> {
        Ok(())
    }
}

/// Where and how archives are collected
///
/// Supplied by the caller, which knows the OS family of the deployment and
/// therefore which package listing command applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub log_path: String,
    pub etc_path: String,
    /// Directory on each node that archived files are copied into
    pub misc_path: String,
    /// Command that lists installed packages (e.g. `dpkg -l`, `rpm -qa`)
    pub list_packages_cmd: String,
}

impl ArchivePlan {
    /// Creates a plan with the conventional paths
    pub fn new(list_packages_cmd: impl Into<String>) -> Self {
        Self {
            log_path: "/var/log".to_string(),
            etc_path: "/etc".to_string(),
            misc_path: "/tmp/monster-archive".to_string(),
            list_packages_cmd: list_packages_cmd.into(),
        }
    }

    /// Command that copies `paths` into this plan's directory for `feature`
    pub fn collect_command(&self, feature: &str, paths: &[&str]) -> String {
        let target = format!("{}/{}", self.misc_path, feature);
        let mut command = format!("mkdir -p {}", target);
        for path in paths {
            command.push_str(&format!(" && cp -r {} {}/", path, target));
        }
        command
    }
}
