//! Persisted node records
//!
//! A node record is what the management hub keeps for each host. The
//! orchestrator treats it as the source of truth across restarts: the
//! `archive` attribute holds the feature tags, status and provisioner tag
//! needed to rebuild the in-memory node.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::command::Connection;
use super::status::Status;

/// Attribute holding the [`ArchiveRecord`]
pub const ARCHIVE_KEY: &str = "archive";
/// Attribute holding the host address
pub const ADDRESS_KEY: &str = "ipaddress";
/// Attribute holding the login user
pub const USER_KEY: &str = "current_user";
/// Attribute holding the login password
pub const PASSWORD_KEY: &str = "password";
/// Attribute holding the name of the owning deployment
pub const DEPLOYMENT_KEY: &str = "deployment";

/// Per-node record stored in the management hub
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub run_list: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_list: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Stores login details under the conventional attribute names
    pub fn with_connection(mut self, connection: &Connection) -> Self {
        self.set_attribute(ADDRESS_KEY, Value::String(connection.address.clone()));
        self.set_attribute(USER_KEY, Value::String(connection.user.clone()));
        self.set_attribute(PASSWORD_KEY, Value::String(connection.password.clone()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Reads an attribute that must be a string
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Name of the deployment this node belongs to, if recorded
    pub fn deployment(&self) -> Option<&str> {
        self.string_attribute(DEPLOYMENT_KEY)
    }

    /// Decodes the archive attribute, if present
    pub fn archive(&self) -> Result<Option<ArchiveRecord>, serde_json::Error> {
        self.attributes
            .get(ARCHIVE_KEY)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    pub fn set_archive(&mut self, archive: &ArchiveRecord) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(archive)?;
        self.set_attribute(ARCHIVE_KEY, value);
        Ok(())
    }
}

/// Restore data for a node: feature tags, status and provisioner tag
///
/// Field names are part of the persisted contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<String>,
}
