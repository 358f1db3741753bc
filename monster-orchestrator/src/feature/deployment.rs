//! Built-in deployment features

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::DeploymentFeature;
use crate::deployment::DeploymentScope;
use crate::error::{OrchestratorError, Result};

/// Deployment features known at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentFeatureKind {
    OpenStack,
    Keystone,
    Neutron,
}

impl DeploymentFeatureKind {
    pub const ALL: [DeploymentFeatureKind; 3] = [
        DeploymentFeatureKind::OpenStack,
        DeploymentFeatureKind::Keystone,
        DeploymentFeatureKind::Neutron,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            DeploymentFeatureKind::OpenStack => "openstack",
            DeploymentFeatureKind::Keystone => "keystone",
            DeploymentFeatureKind::Neutron => "neutron",
        }
    }

    /// Instantiates the feature bound to `owner`
    pub fn instantiate(&self, owner: &str) -> Box<dyn DeploymentFeature> {
        let owner = owner.to_string();
        match self {
            DeploymentFeatureKind::OpenStack => Box::new(OpenStackFeature { owner }),
            DeploymentFeatureKind::Keystone => Box::new(KeystoneFeature { owner }),
            DeploymentFeatureKind::Neutron => Box::new(NeutronFeature { owner }),
        }
    }
}

/// Publishes release, product and OS to the environment
pub struct OpenStackFeature {
    owner: String,
}

#[async_trait]
impl DeploymentFeature for OpenStackFeature {
    fn name(&self) -> &str {
        DeploymentFeatureKind::OpenStack.name()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn update_environment(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        scope.overrides.insert(
            "openstack".to_string(),
            json!({
                "release": scope.branch,
                "product": scope.product,
                "os": scope.os,
            }),
        );
        Ok(())
    }
}

/// Identity service settings and post-build verification
pub struct KeystoneFeature {
    owner: String,
}

#[async_trait]
impl DeploymentFeature for KeystoneFeature {
    fn name(&self) -> &str {
        DeploymentFeatureKind::Keystone.name()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn update_environment(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        scope.overrides.insert(
            "keystone".to_string(),
            json!({
                "admin_user": "admin",
                "admin_tenant": "admin",
            }),
        );
        Ok(())
    }

    async fn post_configure(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        let Some(controller) = scope.search_role("controller").next() else {
            warn!("No controller in {}, skipping keystone check", scope.name);
            return Ok(());
        };

        info!("Verifying keystone on {}", controller.name());
        controller
            .run_cmd("source /root/openrc && keystone user-list")
            .await?;
        Ok(())
    }
}

/// Networking settings; builds on the openstack environment
pub struct NeutronFeature {
    owner: String,
}

#[async_trait]
impl DeploymentFeature for NeutronFeature {
    fn name(&self) -> &str {
        DeploymentFeatureKind::Neutron.name()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn update_environment(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        let release = scope
            .overrides
            .get("openstack")
            .and_then(|openstack| openstack.get("release"))
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::hook(
                    self.name(),
                    "openstack settings must be loaded before neutron",
                )
            })?;

        scope.overrides.insert(
            "neutron".to_string(),
            json!({
                "plugin": "ml2",
                "release": release,
            }),
        );
        Ok(())
    }

    async fn post_configure(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        for node in scope.search_role("network") {
            info!("Checking neutron agents on {}", node.name());
            node.run_cmd("source /root/openrc && neutron agent-list")
                .await?;
        }
        Ok(())
    }
}
