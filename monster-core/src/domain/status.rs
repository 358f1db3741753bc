//! Pipeline status
//!
//! Deployments and nodes share one status vocabulary. The string form is
//! what gets persisted in archive records, so it must stay stable.
//!
//! Deployment progression:
//!
//! ```text
//! provisioning ─▶ loading environment ─▶ environment ready ─▶ pre-configure
//!   ─▶ building nodes ─▶ nodes built ─▶ post-configure ─▶ post-build
//!
//! any non-terminal state ─▶ destroying ─▶ destroyed
//! ```
//!
//! Node build progression:
//!
//! ```text
//! provisioning ─▶ pre-configure ─▶ apply-feature ─▶ post-configure ─▶ done
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "provisioning")]
    Provisioning,
    #[serde(rename = "loading environment")]
    LoadingEnvironment,
    #[serde(rename = "environment ready")]
    EnvironmentReady,
    #[serde(rename = "pre-configure")]
    PreConfigure,
    #[serde(rename = "building nodes")]
    BuildingNodes,
    #[serde(rename = "nodes built")]
    NodesBuilt,
    #[serde(rename = "post-configure")]
    PostConfigure,
    #[serde(rename = "post-build")]
    PostBuild,
    #[serde(rename = "apply-feature")]
    ApplyFeature,
    #[serde(rename = "done")]
    Done,
    #[serde(rename = "destroying")]
    Destroying,
    #[serde(rename = "destroyed")]
    Destroyed,
}

impl Status {
    pub const ALL: [Status; 12] = [
        Status::Provisioning,
        Status::LoadingEnvironment,
        Status::EnvironmentReady,
        Status::PreConfigure,
        Status::BuildingNodes,
        Status::NodesBuilt,
        Status::PostConfigure,
        Status::PostBuild,
        Status::ApplyFeature,
        Status::Done,
        Status::Destroying,
        Status::Destroyed,
    ];

    /// Persisted string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Provisioning => "provisioning",
            Status::LoadingEnvironment => "loading environment",
            Status::EnvironmentReady => "environment ready",
            Status::PreConfigure => "pre-configure",
            Status::BuildingNodes => "building nodes",
            Status::NodesBuilt => "nodes built",
            Status::PostConfigure => "post-configure",
            Status::PostBuild => "post-build",
            Status::ApplyFeature => "apply-feature",
            Status::Done => "done",
            Status::Destroying => "destroying",
            Status::Destroyed => "destroyed",
        }
    }

    /// Whether the owner is being or has been torn down
    ///
    /// No further pipeline calls are valid once this is true.
    pub const fn is_torn_down(&self) -> bool {
        matches!(self, Status::Destroying | Status::Destroyed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
