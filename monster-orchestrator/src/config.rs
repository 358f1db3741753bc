//! Engine configuration
//!
//! Tunables for the build pipeline and the SSH command runner. Values come
//! from environment variables with fallback to defaults.

use std::time::Duration;

use crate::error::{OrchestratorError, Result};
use crate::provisioner::STATIC_PROVISIONER;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times a node runs the management hub client before its
    /// features are applied
    pub chef_client_runs: u32,

    /// Provisioner tag used when a restored record names none
    pub default_provisioner: String,
}

impl EngineConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - MONSTER_CHEF_CLIENT_RUNS (optional, default: 1)
    /// - MONSTER_DEFAULT_PROVISIONER (optional, default: static)
    pub fn from_env() -> Result<Self> {
        let chef_client_runs = match std::env::var("MONSTER_CHEF_CLIENT_RUNS") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                OrchestratorError::Config(format!(
                    "MONSTER_CHEF_CLIENT_RUNS must be a positive integer, got '{}'",
                    raw
                ))
            })?,
            Err(_) => 1,
        };

        let default_provisioner = std::env::var("MONSTER_DEFAULT_PROVISIONER")
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|_| STATIC_PROVISIONER.to_string());

        let config = Self {
            chef_client_runs,
            default_provisioner,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.chef_client_runs == 0 {
            return Err(OrchestratorError::Config(
                "chef_client_runs must be greater than 0".to_string(),
            ));
        }

        if self.default_provisioner.trim().is_empty() {
            return Err(OrchestratorError::Config(
                "default_provisioner cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chef_client_runs: 1,
            default_provisioner: STATIC_PROVISIONER.to_string(),
        }
    }
}

/// SSH runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    /// Maximum time to wait for the TCP connection
    pub connect_timeout: Duration,

    /// Verify host keys against known_hosts
    pub strict_host_key_checking: bool,
}

impl SshConfig {
    /// Creates configuration from environment variables
    ///
    /// - MONSTER_SSH_CONNECT_TIMEOUT (optional, seconds, default: 10)
    /// - MONSTER_SSH_STRICT (optional, "true"/"false", default: false)
    pub fn from_env() -> Self {
        let connect_timeout = std::env::var("MONSTER_SSH_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let strict_host_key_checking = std::env::var("MONSTER_SSH_STRICT")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            connect_timeout,
            strict_host_key_checking,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            strict_host_key_checking: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.chef_client_runs, 1);
        assert_eq!(config.default_provisioner, "static");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.chef_client_runs = 0;
        assert!(config.validate().is_err());

        config.chef_client_runs = 3;
        assert!(config.validate().is_ok());

        config.default_provisioner = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_ssh_config() {
        let config = SshConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(!config.strict_host_key_checking);
    }
}
