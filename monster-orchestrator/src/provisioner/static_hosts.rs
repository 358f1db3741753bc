//! Provisioner for pre-existing hosts
//!
//! Adopts machines that were built outside the orchestrator. Creating a node
//! claims the host named in the request; destroying it drops the claim and
//! leaves the machine untouched.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{NodeHandle, ProvisionSpec, Provisioner};
use crate::error::{OrchestratorError, Result};

/// Tag of the static provisioner
pub const STATIC_PROVISIONER: &str = "static";

#[derive(Debug, Default)]
pub struct StaticProvisioner {
    /// Addresses currently claimed by a node
    claimed: Mutex<HashSet<String>>,
}

impl StaticProvisioner {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    fn name(&self) -> &str {
        STATIC_PROVISIONER
    }

    async fn create(&self, spec: &ProvisionSpec) -> Result<NodeHandle> {
        let connection = spec.connection.clone().ok_or_else(|| {
            OrchestratorError::provision(format!(
                "static provisioner needs an address for {}",
                spec.name
            ))
        })?;

        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| OrchestratorError::provision("lock poisoned"))?;
        if !claimed.insert(connection.address.clone()) {
            return Err(OrchestratorError::provision(format!(
                "host {} is already claimed",
                connection.address
            )));
        }

        info!("Claimed host {} for {}", connection.address, spec.name);
        Ok(NodeHandle {
            name: spec.name.clone(),
            connection,
        })
    }

    async fn destroy(&self, handle: &NodeHandle) -> Result<()> {
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| OrchestratorError::provision("lock poisoned"))?;

        // Restored nodes were claimed by an earlier process
        if !claimed.remove(&handle.connection.address) {
            warn!(
                "Host {} was not claimed by this process, releasing anyway",
                handle.connection.address
            );
        }

        info!("Released host {} from {}", handle.connection.address, handle.name);
        Ok(())
    }
}
