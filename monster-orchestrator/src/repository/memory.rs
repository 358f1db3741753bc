//! In-memory record store

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use monster_core::domain::record::NodeRecord;

use super::RecordStore;
use crate::error::{OrchestratorError, Result};

/// Record store backed by a map
///
/// Data is lost when the process exits. Used for tests and for embedding the
/// engine where another layer owns durability.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, NodeRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = NodeRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self, node: &str) -> Result<Option<NodeRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| OrchestratorError::store("lock poisoned"))?;
        Ok(records.get(node).cloned())
    }

    async fn save(&self, record: &NodeRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| OrchestratorError::store("lock poisoned"))?;
        records.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, node: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| OrchestratorError::store("lock poisoned"))?;
        records.remove(node);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| OrchestratorError::store("lock poisoned"))?;
        Ok(records.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryRecordStore::new();
        assert!(store.load("dep-a").await.unwrap().is_none());

        store.save(&NodeRecord::new("dep-b")).await.unwrap();
        store.save(&NodeRecord::new("dep-a")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["dep-a", "dep-b"]);

        store.delete("dep-a").await.unwrap();
        store.delete("dep-a").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["dep-b"]);
    }

    #[tokio::test]
    async fn test_attribute_get_set() {
        let store = MemoryRecordStore::with_records([NodeRecord::new("dep-a")]);

        store.set("dep-a", "flavor", json!("large")).await.unwrap();
        assert_eq!(
            store.get("dep-a", "flavor").await.unwrap(),
            Some(json!("large"))
        );
        assert_eq!(store.get("dep-a", "missing").await.unwrap(), None);
        assert_eq!(store.get("dep-zzz", "flavor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_on_missing_record_fails() {
        let store = MemoryRecordStore::new();
        let result = store.set("dep-a", "flavor", json!("large")).await;
        assert!(matches!(result, Err(OrchestratorError::RecordNotFound(n)) if n == "dep-a"));
    }
}
