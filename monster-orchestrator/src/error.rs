//! Error types for the orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur while building, restoring or destroying deployments
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A feature or provisioner tag has no registered implementation
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// The record store could not be read or written
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A node has no record in the store
    #[error("No record for node {0}")]
    RecordNotFound(String),

    /// A node record is missing required data or holds undecodable data
    #[error("Invalid record for node {node}: {reason}")]
    InvalidRecord {
        /// Node name
        node: String,
        /// What was wrong with the record
        reason: String,
    },

    /// A remote command could not be executed
    #[error("Connection to {node} failed: {message}")]
    Connection {
        /// Node name
        node: String,
        /// Transport error message
        message: String,
    },

    /// A remote command ran but exited non-zero
    #[error("Command '{command}' on {node} exited with {exit_code}: {stderr}")]
    CommandFailed {
        node: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Resource creation or destruction failed
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// A feature hook failed
    #[error("Feature {feature} failed: {message}")]
    Hook {
        /// Feature tag
        feature: String,
        /// Failure description
        message: String,
    },

    /// Destroy was requested on a node that is already destroyed
    #[error("Node {0} is already destroyed")]
    AlreadyDestroyed(String),

    /// A pipeline operation was requested on a torn down deployment
    #[error("Deployment {0} has been destroyed")]
    DeploymentDestroyed(String),

    /// A node does not belong to the deployment it is being attached to
    #[error("Node {node} cannot join deployment {deployment}: {reason}")]
    InvalidNode {
        node: String,
        deployment: String,
        reason: String,
    },

    /// A node could not be rebuilt from its record
    #[error("Failed to restore node {node}: {source}")]
    Restore {
        /// Node name
        node: String,
        /// Underlying failure
        #[source]
        source: Box<OrchestratorError>,
    },

    /// One or more nodes failed to destroy during a deployment-wide destroy
    #[error("Deployment {deployment} destroy failed for {} node(s)", .failures.len())]
    Destroy {
        deployment: String,
        /// Node name and its failure, in node order
        failures: Vec<(String, OrchestratorError)>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrchestratorError {
    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Create a provisioning error
    pub fn provision(message: impl Into<String>) -> Self {
        Self::Provision(message.into())
    }

    /// Create a feature hook error
    pub fn hook(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            feature: feature.into(),
            message: message.into(),
        }
    }

    /// Check if this error, or the error it wraps, is an unknown capability
    pub fn is_unknown_capability(&self) -> bool {
        match self {
            Self::UnknownCapability(_) => true,
            Self::Restore { source, .. } => source.is_unknown_capability(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_wraps_unknown_capability() {
        let err = OrchestratorError::Restore {
            node: "dep-node1".to_string(),
            source: Box::new(OrchestratorError::UnknownCapability("ghost".to_string())),
        };

        assert!(err.is_unknown_capability());
        assert_eq!(
            err.to_string(),
            "Failed to restore node dep-node1: Unknown capability: ghost"
        );
    }

    #[test]
    fn test_destroy_message_counts_failures() {
        let err = OrchestratorError::Destroy {
            deployment: "dep".to_string(),
            failures: vec![(
                "dep-a".to_string(),
                OrchestratorError::provision("host vanished"),
            )],
        };

        assert!(!err.is_unknown_capability());
        assert_eq!(err.to_string(), "Deployment dep destroy failed for 1 node(s)");
    }
}
