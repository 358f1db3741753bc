//! Data transfer objects
//!
//! Serializable snapshots of in-memory deployments and nodes. The engine
//! produces them; the CLI prints them or emits them as JSON.

use serde::{Deserialize, Serialize};

use crate::domain::status::Status;

/// Snapshot of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub address: String,
    pub os: String,
    pub branch: String,
    pub status: Status,
    pub provisioner: String,
    pub features: Vec<String>,
    pub run_list: Vec<String>,
}

/// Snapshot of a deployment and its nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub os: String,
    pub branch: String,
    pub product: String,
    pub provisioner: String,
    pub status: Status,
    pub features: Vec<String>,
    pub nodes: Vec<NodeSummary>,
}

impl DeploymentSummary {
    /// Nodes carrying the given feature tag
    pub fn nodes_with(&self, feature: &str) -> impl Iterator<Item = &NodeSummary> {
        let feature = feature.to_lowercase();
        self.nodes
            .iter()
            .filter(move |node| node.features.iter().any(|f| *f == feature))
    }
}
