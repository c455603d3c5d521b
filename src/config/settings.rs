//! Host configuration for studysync.
//!
//! Settings are loaded from `~/.studysync/config.yaml`. The sync tuning knobs
//! (retry delay, queue size, auto-sync) are not here: they live in the
//! database next to the queue, see [`crate::sync::SyncSettings`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::SyncError;
use crate::sync::BreakerConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote mutation endpoint.
    pub remote: RemoteConfig,
    /// Circuit breaker thresholds.
    pub circuit: CircuitConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Remote endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the mutation API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request transport timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Seconds the circuit stays open before allowing trial calls.
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when no environment override is set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_success_threshold() -> u32 {
    2
}

const fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

impl RemoteConfig {
    /// Transport timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

impl From<&CircuitConfig> for BreakerConfig {
    fn from(config: &CircuitConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), SyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.remote.timeout_secs, 15);
        assert!(config.remote.auth_token.is_none());
        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.circuit.success_threshold, 2);
        assert_eq!(config.circuit.reset_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from_path(&temp_dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.remote.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = Config::default();
        config.remote.base_url = "https://planner.example/api".to_string();
        config.circuit.failure_threshold = 3;
        config.save_to_path(&config_path).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap();
        assert_eq!(loaded.remote.base_url, "https://planner.example/api");
        assert_eq!(loaded.circuit.failure_threshold, 3);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let partial_yaml = r"
circuit:
  reset_timeout_secs: 60
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.circuit.reset_timeout_secs, 60);
        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.remote.timeout_secs, 15);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "circuit: [not, a, map]").unwrap();

        assert!(matches!(
            Config::load_from_path(&config_path),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_breaker_config_from_circuit() {
        let circuit = CircuitConfig {
            failure_threshold: 0,
            success_threshold: 4,
            reset_timeout_secs: 10,
        };
        let breaker = BreakerConfig::from(&circuit);
        assert_eq!(breaker.failure_threshold, 1);
        assert_eq!(breaker.success_threshold, 4);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(10));
    }
}
