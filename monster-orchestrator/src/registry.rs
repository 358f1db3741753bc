//! Capability registry
//!
//! Maps lowercase capability tags to constructors for node features,
//! deployment features and provisioners. The same lookup serves explicit
//! attachment (`add_features`) and restoration from persisted tags; an
//! unregistered tag fails with `UnknownCapability`.
//!
//! [`CapabilityRegistry::standard`] is populated from the built-in kinds at
//! startup. Embedders may register additional capabilities before the
//! registry is shared.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{OrchestratorError, Result};
use crate::feature::{DeploymentFeature, DeploymentFeatureKind, NodeFeature, NodeFeatureKind};
use crate::provisioner::{Provisioner, ProvisionerKind};

/// Builds a node feature bound to the named node
pub type NodeFeatureFactory = Arc<dyn Fn(&str) -> Box<dyn NodeFeature> + Send + Sync>;
/// Builds a deployment feature bound to the named deployment
pub type DeploymentFeatureFactory = Arc<dyn Fn(&str) -> Box<dyn DeploymentFeature> + Send + Sync>;
pub type ProvisionerFactory = Arc<dyn Fn() -> Arc<dyn Provisioner> + Send + Sync>;

#[derive(Default)]
pub struct CapabilityRegistry {
    node_features: BTreeMap<String, NodeFeatureFactory>,
    deployment_features: BTreeMap<String, DeploymentFeatureFactory>,
    provisioners: BTreeMap<String, ProvisionerFactory>,
}

impl CapabilityRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in capability
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in NodeFeatureKind::ALL {
            registry.register_node_feature(kind.name(), move |owner: &str| kind.instantiate(owner));
        }
        for kind in DeploymentFeatureKind::ALL {
            registry.register_deployment_feature(kind.name(), move |owner: &str| {
                kind.instantiate(owner)
            });
        }
        for kind in ProvisionerKind::ALL {
            let shared = kind.instantiate();
            registry.register_provisioner(kind.name(), move || shared.clone());
        }
        registry
    }

    /// Registers a node feature under `name` (case-insensitive)
    ///
    /// # Panics
    /// Panics if a node feature with the same name is already registered
    pub fn register_node_feature<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn NodeFeature> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.node_features.contains_key(&key) {
            panic!("Node feature '{}' is already registered", key);
        }
        self.node_features.insert(key, Arc::new(factory));
    }

    /// Registers a deployment feature under `name` (case-insensitive)
    ///
    /// # Panics
    /// Panics if a deployment feature with the same name is already registered
    pub fn register_deployment_feature<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn DeploymentFeature> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.deployment_features.contains_key(&key) {
            panic!("Deployment feature '{}' is already registered", key);
        }
        self.deployment_features.insert(key, Arc::new(factory));
    }

    /// Registers a provisioner under `name` (case-insensitive)
    ///
    /// # Panics
    /// Panics if a provisioner with the same name is already registered
    pub fn register_provisioner<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Provisioner> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.provisioners.contains_key(&key) {
            panic!("Provisioner '{}' is already registered", key);
        }
        self.provisioners.insert(key, Arc::new(factory));
    }

    /// Instantiates the node feature `name` bound to `owner`
    pub fn node_feature(&self, name: &str, owner: &str) -> Result<Box<dyn NodeFeature>> {
        self.node_features
            .get(&name.to_lowercase())
            .map(|factory| factory(owner))
            .ok_or_else(|| OrchestratorError::UnknownCapability(name.to_string()))
    }

    /// Instantiates the deployment feature `name` bound to `owner`
    pub fn deployment_feature(&self, name: &str, owner: &str) -> Result<Box<dyn DeploymentFeature>> {
        self.deployment_features
            .get(&name.to_lowercase())
            .map(|factory| factory(owner))
            .ok_or_else(|| OrchestratorError::UnknownCapability(name.to_string()))
    }

    /// Instantiates the provisioner `name`
    pub fn provisioner(&self, name: &str) -> Result<Arc<dyn Provisioner>> {
        self.provisioners
            .get(&name.to_lowercase())
            .map(|factory| factory())
            .ok_or_else(|| OrchestratorError::UnknownCapability(name.to_string()))
    }

    pub fn node_feature_names(&self) -> impl Iterator<Item = &str> {
        self.node_features.keys().map(String::as_str)
    }

    pub fn deployment_feature_names(&self) -> impl Iterator<Item = &str> {
        self.deployment_features.keys().map(String::as_str)
    }

    pub fn provisioner_names(&self) -> impl Iterator<Item = &str> {
        self.provisioners.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("node_features", &self.node_features.keys().collect::<Vec<_>>())
            .field(
                "deployment_features",
                &self.deployment_features.keys().collect::<Vec<_>>(),
            )
            .field("provisioners", &self.provisioners.keys().collect::<Vec<_>>())
            .finish()
    }
}
