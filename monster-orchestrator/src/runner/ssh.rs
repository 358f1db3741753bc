//! SSH command runner
//!
//! Runs commands through `sshpass` + `ssh` with password authentication,
//! which is how freshly provisioned hosts are reachable before any keys
//! are installed.

use async_trait::async_trait;
use monster_core::domain::command::{CommandOutput, Connection};
use tokio::process::Command;
use tracing::debug;

use super::CommandRunner;
use crate::config::SshConfig;
use crate::error::{OrchestratorError, Result};

/// ssh exits with this status when the connection itself fails
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, Clone, Default)]
pub struct SshCommandRunner {
    config: SshConfig,
}

impl SshCommandRunner {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn command(&self, connection: &Connection, command: &str) -> Command {
        let mut cmd = Command::new("sshpass");
        cmd.arg("-p").arg(&connection.password).arg("ssh");

        if !self.config.strict_host_key_checking {
            cmd.args(["-o", "UserKnownHostsFile=/dev/null"])
                .args(["-o", "StrictHostKeyChecking=no"]);
        }

        cmd.args(["-o", "LogLevel=quiet"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout.as_secs()
            ))
            .arg("-l")
            .arg(&connection.user)
            .arg(&connection.address)
            .arg(command)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for SshCommandRunner {
    async fn run(
        &self,
        node: &str,
        connection: &Connection,
        command: &str,
    ) -> Result<CommandOutput> {
        debug!("Running on {} ({}): {}", node, connection.address, command);

        let output = self
            .command(connection, command)
            .output()
            .await
            .map_err(|e| OrchestratorError::Connection {
                node: node.to_string(),
                message: format!("Failed to execute sshpass: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", node, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", node, stderr.trim());
        }

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == SSH_CONNECTION_FAILURE {
            return Err(OrchestratorError::Connection {
                node: node.to_string(),
                message: format!("ssh to {} failed: {}", connection.address, stderr.trim()),
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}
