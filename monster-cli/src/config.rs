//! Configuration module
//!
//! Holds CLI settings and wires them into an engine context.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use monster_orchestrator::repository::FileRecordStore;
use monster_orchestrator::runner::SshCommandRunner;
use monster_orchestrator::{
    CapabilityRegistry, Context, DeploymentParams, EngineConfig, Environment, SshConfig,
};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the local record store
    pub store_dir: String,
    /// Directory of the remote record store, if mirrored
    pub remote_dir: Option<String>,
    pub os: String,
    pub branch: String,
    pub product: String,
    /// Emit JSON instead of formatted text
    pub json: bool,
}

impl Config {
    /// Builds the engine context from this configuration and the environment
    pub fn context(&self) -> Result<Context> {
        let engine = EngineConfig::from_env().context("Invalid engine configuration")?;

        let local = Arc::new(FileRecordStore::new(&self.store_dir));
        let mut environment = Environment::new("monster", local);
        if let Some(remote_dir) = &self.remote_dir {
            environment = environment.with_remote(Arc::new(FileRecordStore::new(remote_dir)));
        }

        let runner = SshCommandRunner::new(SshConfig::from_env());

        Ok(Context::new(
            Arc::new(environment),
            Arc::new(runner),
            Arc::new(CapabilityRegistry::standard()),
            engine,
        ))
    }

    pub fn deployment_params(&self) -> DeploymentParams {
        DeploymentParams {
            os: self.os.clone(),
            branch: self.branch.clone(),
            product: self.product.clone(),
        }
    }

    /// Package listing command for the configured OS family
    pub fn list_packages_cmd(&self) -> &'static str {
        match self.os.to_lowercase().as_str() {
            os if os.starts_with("ubuntu") || os.starts_with("debian") => "dpkg -l",
            _ => "rpm -qa",
        }
    }
}
