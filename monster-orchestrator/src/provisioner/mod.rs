//! Provisioners
//!
//! A provisioner creates and releases the compute resource behind a node.
//! Each implementation is identified by a lowercase tag which is persisted
//! in the node's archive record and resolved through the
//! [`CapabilityRegistry`](crate::registry::CapabilityRegistry) on restore.

mod static_hosts;

pub use static_hosts::{STATIC_PROVISIONER, StaticProvisioner};

use std::sync::Arc;

use async_trait::async_trait;
use monster_core::domain::command::Connection;

use crate::error::Result;

/// Request to create the resource for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSpec {
    /// Full node name (`<deployment>-<suffix>`)
    pub name: String,
    pub os: String,
    pub product: String,
    pub branch: String,
    /// Login details for a host that already exists, if any
    pub connection: Option<Connection>,
}

/// Handle to a created resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub name: String,
    pub connection: Connection,
}

/// Trait for compute resource backends
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Lowercase tag persisted in archive records
    fn name(&self) -> &str;

    /// Creates the resource for a node
    async fn create(&self, spec: &ProvisionSpec) -> Result<NodeHandle>;

    /// Releases the resource behind a node
    async fn destroy(&self, handle: &NodeHandle) -> Result<()>;
}

/// Provisioners known at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerKind {
    Static,
}

impl ProvisionerKind {
    pub const ALL: [ProvisionerKind; 1] = [ProvisionerKind::Static];

    pub const fn name(&self) -> &'static str {
        match self {
            ProvisionerKind::Static => STATIC_PROVISIONER,
        }
    }

    pub fn instantiate(&self) -> Arc<dyn Provisioner> {
        match self {
            ProvisionerKind::Static => Arc::new(StaticProvisioner::new()),
        }
    }
}
