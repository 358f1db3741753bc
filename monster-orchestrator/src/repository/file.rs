//! File-backed record store
//!
//! Keeps one pretty-printed JSON document per node under a directory:
//! `<dir>/<node>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use monster_core::domain::record::NodeRecord;
use tracing::debug;

use super::RecordStore;
use crate::error::{OrchestratorError, Result};

/// Record store backed by a directory of JSON files
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Creates a store rooted at `dir`
    ///
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, node: &str) -> Result<PathBuf> {
        if node.is_empty() || node.contains(['/', '\\']) || node.starts_with('.') {
            return Err(OrchestratorError::InvalidRecord {
                node: node.to_string(),
                reason: "node name is not usable as a file name".to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.json", node)))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn load(&self, node: &str) -> Result<Option<NodeRecord>> {
        let path = self.path_for(node)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrchestratorError::store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let record = serde_json::from_slice(&raw).map_err(|e| OrchestratorError::InvalidRecord {
            node: node.to_string(),
            reason: format!("malformed JSON in {}: {}", path.display(), e),
        })?;
        Ok(Some(record))
    }

    async fn save(&self, record: &NodeRecord) -> Result<()> {
        let path = self.path_for(&record.name)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            OrchestratorError::store(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| OrchestratorError::store(format!("Failed to encode record: {}", e)))?;

        // Write then rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| {
            OrchestratorError::store(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            OrchestratorError::store(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Saved record {} to {}", record.name, path.display());
        Ok(())
    }

    async fn delete(&self, node: &str) -> Result<()> {
        let path = self.path_for(node)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::store(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(OrchestratorError::store(format!(
                    "Failed to list {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::store(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> FileRecordStore {
        let dir = std::env::temp_dir().join(format!("monster-store-{}", uuid::Uuid::new_v4()));
        FileRecordStore::new(dir)
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let store = temp_store();
        assert!(store.list().await.unwrap().is_empty());

        let mut record = NodeRecord::new("dep-node1");
        record.run_list = vec!["recipe[a]".to_string()];
        record.set_attribute("ipaddress", json!("10.0.0.4"));
        store.save(&record).await.unwrap();

        assert_eq!(store.load("dep-node1").await.unwrap(), Some(record));
        assert_eq!(store.list().await.unwrap(), vec!["dep-node1"]);

        store.delete("dep-node1").await.unwrap();
        assert!(store.load("dep-node1").await.unwrap().is_none());

        tokio::fs::remove_dir_all(store.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let store = temp_store();
        let result = store.load("../etc/passwd").await;
        assert!(matches!(result, Err(OrchestratorError::InvalidRecord { .. })));
    }
}
