//! Record store layer
//!
//! Record stores persist one [`NodeRecord`] per node identity. They are the
//! only state that survives a process restart; in-memory nodes and
//! deployments are a cache of what the store holds.
//!
//! All stores are trait-based so the engine can run against the real
//! management hub, a directory of JSON files, or memory in tests.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use monster_core::domain::record::NodeRecord;
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

/// Persistence for node records, keyed by node name
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads a node record
    ///
    /// Returns `None` if the store has no record for `node`.
    async fn load(&self, node: &str) -> Result<Option<NodeRecord>>;

    /// Writes a whole node record, replacing any previous version
    async fn save(&self, record: &NodeRecord) -> Result<()>;

    /// Removes a node record; removing a missing record is not an error
    async fn delete(&self, node: &str) -> Result<()>;

    /// Lists the names of every stored node, sorted
    async fn list(&self) -> Result<Vec<String>>;

    /// Reads a single attribute of a node record
    async fn get(&self, node: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .load(node)
            .await?
            .and_then(|record| record.attribute(key).cloned()))
    }

    /// Writes a single attribute and saves the record
    async fn set(&self, node: &str, key: &str, value: Value) -> Result<()> {
        let mut record = self
            .load(node)
            .await?
            .ok_or_else(|| OrchestratorError::RecordNotFound(node.to_string()))?;
        record.set_attribute(key, value);
        self.save(&record).await
    }
}
