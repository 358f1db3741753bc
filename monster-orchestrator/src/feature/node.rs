//! Built-in node features

use async_trait::async_trait;
use tracing::info;

use super::{ArchivePlan, NodeFeature};
use crate::error::Result;
use crate::node::Host;

/// Tag of the management hub feature
///
/// A node carrying it *is* the hub, so it never runs the hub client.
pub const CHEF_SERVER: &str = "chefserver";

const CHEF_SERVER_INSTALL: &str =
    "curl -sL https://raw.github.com/rcbops/support-tools/master/chef-install/install-chef-server.sh | bash";

/// Node features known at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFeatureKind {
    ChefServer,
    Controller,
    Compute,
    Network,
    Storage,
}

impl NodeFeatureKind {
    pub const ALL: [NodeFeatureKind; 5] = [
        NodeFeatureKind::ChefServer,
        NodeFeatureKind::Controller,
        NodeFeatureKind::Compute,
        NodeFeatureKind::Network,
        NodeFeatureKind::Storage,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            NodeFeatureKind::ChefServer => CHEF_SERVER,
            NodeFeatureKind::Controller => "controller",
            NodeFeatureKind::Compute => "compute",
            NodeFeatureKind::Network => "network",
            NodeFeatureKind::Storage => "storage",
        }
    }

    /// Instantiates the feature bound to `owner`
    pub fn instantiate(&self, owner: &str) -> Box<dyn NodeFeature> {
        match self {
            NodeFeatureKind::ChefServer => Box::new(ChefServerFeature::new(owner)),
            kind => Box::new(RoleFeature::new(*kind, owner)),
        }
    }

    /// Run-list role applied by role features
    const fn role(&self) -> Option<&'static str> {
        match self {
            NodeFeatureKind::ChefServer => None,
            NodeFeatureKind::Controller => Some("role[ha-controller1]"),
            NodeFeatureKind::Compute => Some("role[single-compute]"),
            NodeFeatureKind::Network => Some("role[single-network-node]"),
            NodeFeatureKind::Storage => Some("role[swift-all-in-one]"),
        }
    }

    /// Service directories collected when archiving
    const fn archive_paths(&self) -> &'static [&'static str] {
        match self {
            NodeFeatureKind::ChefServer => &["/var/log/chef-server", "/etc/chef-server"],
            NodeFeatureKind::Controller => &["/var/log/keystone", "/var/log/nova", "/etc/nova"],
            NodeFeatureKind::Compute => &["/var/log/nova", "/var/log/libvirt"],
            NodeFeatureKind::Network => &["/var/log/neutron", "/etc/neutron"],
            NodeFeatureKind::Storage => &["/var/log/swift", "/etc/swift"],
        }
    }
}

/// Turns a node into the management hub
pub struct ChefServerFeature {
    owner: String,
}

impl ChefServerFeature {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl NodeFeature for ChefServerFeature {
    fn name(&self) -> &str {
        CHEF_SERVER
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn pre_configure(&self, host: &mut Host) -> Result<()> {
        info!("Installing chef server on {}", host.name());
        host.run_cmd(CHEF_SERVER_INSTALL).await?;
        Ok(())
    }

    async fn apply_feature(&self, host: &mut Host) -> Result<()> {
        host.run_cmd("chef-server-ctl reconfigure").await?;
        Ok(())
    }

    async fn archive(&self, host: &mut Host, plan: &ArchivePlan) -> Result<()> {
        let command = plan.collect_command(CHEF_SERVER, NodeFeatureKind::ChefServer.archive_paths());
        host.run_cmd(&command).await?;
        Ok(())
    }
}

/// Assigns an OpenStack role to a node through its run-list
pub struct RoleFeature {
    kind: NodeFeatureKind,
    owner: String,
}

impl RoleFeature {
    pub fn new(kind: NodeFeatureKind, owner: impl Into<String>) -> Self {
        Self {
            kind,
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl NodeFeature for RoleFeature {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn pre_configure(&self, host: &mut Host) -> Result<()> {
        if let Some(role) = self.kind.role() {
            host.add_run_list_item([role]).await?;
        }
        Ok(())
    }

    async fn archive(&self, host: &mut Host, plan: &ArchivePlan) -> Result<()> {
        let command = plan.collect_command(self.kind.name(), self.kind.archive_paths());
        host.run_cmd(&command).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_lowercase_and_unique() {
        let mut names: Vec<_> = NodeFeatureKind::ALL.iter().map(|k| k.name()).collect();
        assert!(names.iter().all(|n| *n == n.to_lowercase()));
        names.sort();
        names.dedup();
        assert_eq!(names.len(), NodeFeatureKind::ALL.len());
    }

    #[test]
    fn test_instantiate_binds_owner() {
        for kind in NodeFeatureKind::ALL {
            let feature = kind.instantiate("dep-node1");
            assert_eq!(feature.name(), kind.name());
            assert_eq!(feature.owner(), "dep-node1");
        }
    }

    #[test]
    fn test_only_hub_has_no_role() {
        assert_eq!(NodeFeatureKind::ChefServer.role(), None);
        assert_eq!(
            NodeFeatureKind::Network.role(),
            Some("role[single-network-node]")
        );
    }
}
