//! Remote command execution
//!
//! The engine runs commands on nodes through the [`CommandRunner`] trait.
//! A non-zero exit status is returned as output, not as an error; callers
//! decide whether it is fatal.

mod ssh;

pub use ssh::SshCommandRunner;

use async_trait::async_trait;
use monster_core::domain::command::{CommandOutput, Connection};

use crate::error::Result;

/// Executes shell commands on a node
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` on the host behind `connection`
    ///
    /// # Errors
    /// Returns `OrchestratorError::Connection` if the command could not be
    /// executed at all.
    async fn run(&self, node: &str, connection: &Connection, command: &str)
    -> Result<CommandOutput>;
}
