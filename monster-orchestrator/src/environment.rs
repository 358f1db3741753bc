//! Management hub environment
//!
//! An environment pairs the local record store with an optional remote one.
//! Writes go to both; `save_locally` pulls the remote copy back down after a
//! node has updated itself remotely (for example after a client run).

use std::sync::Arc;

use monster_core::domain::record::NodeRecord;
use serde_json::Value;
use tracing::debug;

use crate::error::{OrchestratorError, Result};
use crate::repository::RecordStore;

pub struct Environment {
    name: String,
    local: Arc<dyn RecordStore>,
    remote: Option<Arc<dyn RecordStore>>,
}

impl Environment {
    /// Creates an environment with only a local store
    pub fn new(name: impl Into<String>, local: Arc<dyn RecordStore>) -> Self {
        Self {
            name: name.into(),
            local,
            remote: None,
        }
    }

    /// Adds a remote store that every save is mirrored to
    pub fn with_remote(mut self, remote: Arc<dyn RecordStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local(&self) -> &Arc<dyn RecordStore> {
        &self.local
    }

    pub fn remote(&self) -> Option<&Arc<dyn RecordStore>> {
        self.remote.as_ref()
    }

    /// Loads a node record from the local store
    pub async fn record(&self, node: &str) -> Result<NodeRecord> {
        self.local
            .load(node)
            .await?
            .ok_or_else(|| OrchestratorError::RecordNotFound(node.to_string()))
    }

    /// Saves a node record locally and, if configured, remotely
    pub async fn save(&self, record: &NodeRecord) -> Result<()> {
        self.local.save(record).await?;
        if let Some(remote) = &self.remote {
            remote.save(record).await?;
        }
        Ok(())
    }

    /// Copies the remote version of a node record into the local store
    pub async fn save_locally(&self, node: &str) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };

        match remote.load(node).await? {
            Some(record) => {
                debug!("Mirroring remote record {} locally", node);
                self.local.save(&record).await
            }
            None => Err(OrchestratorError::RecordNotFound(node.to_string())),
        }
    }

    /// Reads one attribute of a node record
    pub async fn get(&self, node: &str, key: &str) -> Result<Option<Value>> {
        self.local.get(node, key).await
    }

    /// Removes a node record from every store
    ///
    /// Both stores are attempted; the first failure is returned.
    pub async fn delete(&self, node: &str) -> Result<()> {
        let local = self.local.delete(node).await;
        let remote = match &self.remote {
            Some(remote) => remote.delete(node).await,
            None => Ok(()),
        };
        local.and(remote)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("remote", &self.remote.is_some())
            .finish()
    }
}
