//! Monster Orchestrator
//!
//! Builds, restores and tears down multi-node deployments.
//!
//! This crate contains:
//! - Deployment and node engine: the build pipeline and node lifecycle
//! - Features: pluggable capabilities attached to nodes and deployments
//! - Collaborators: record stores, provisioners and command runners
//! - Capability registry: name-based lookup used when restoring from records

pub mod config;
pub mod context;
pub mod deployment;
pub mod environment;
pub mod error;
pub mod feature;
pub mod node;
pub mod provisioner;
pub mod registry;
pub mod repository;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, SshConfig};
pub use context::Context;
pub use deployment::{Clients, Deployment, DeploymentParams, DeploymentScope};
pub use environment::Environment;
pub use error::{OrchestratorError, Result};
pub use feature::{ArchivePlan, DeploymentFeature, NodeFeature};
pub use node::{Host, Node, NodeParams};
pub use registry::CapabilityRegistry;
