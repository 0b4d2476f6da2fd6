//! Monitor Configuration
//!
//! Configuration management for the De-Ransom monitor client.

use anyhow::{Context, Result};
use deransom_protocol::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server to subscribe to
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconnection tuning
    #[serde(default)]
    pub socket: SocketConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the De-Ransom server; the push endpoint is derived from it
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Reconnection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Delay before the first reconnection attempt, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling on the reconnection delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplicative growth applied after each attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Reconnection attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            socket: SocketConfig::default(),
        }
    }
}

impl SocketConfig {
    /// Translate to the protocol crate's reconnection policy
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            growth_factor: self.backoff_factor,
            max_attempts: self.max_attempts,
        }
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("deransom")
            .join("monitor.toml")
    }

    /// Load configuration
    ///
    /// With an explicit path the file must exist. Otherwise the default
    /// location is used and a default config is written there on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))
            }
            None => {
                let path = Self::default_path();
                if path.exists() {
                    let contents = fs::read_to_string(&path)
                        .context("Failed to read config file")?;
                    toml::from_str(&contents).context("Failed to parse config file")
                } else {
                    let config = Config::default();
                    config.save(&path)?;
                    Ok(config)
                }
            }
        }
    }

    /// Save configuration to the given path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.socket.base_delay_ms, 2000);
        assert_eq!(config.socket.max_attempts, 5);
    }

    #[test]
    fn test_reconnect_policy_translation() {
        let config = SocketConfig {
            base_delay_ms: 100,
            max_delay_ms: 900,
            backoff_factor: 2.0,
            max_attempts: 7,
        };

        let policy = config.reconnect_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_millis(900));
        assert_eq!(policy.max_attempts, 7);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        let mut config = Config::default();
        config.server.base_url = "https://deransom.example.com".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.base_url, "https://deransom.example.com");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        fs::write(&path, "[server]\nbase_url = \"http://10.0.0.7:8080\"\n").unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.base_url, "http://10.0.0.7:8080");
        assert_eq!(loaded.socket.max_attempts, 5);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/monitor.toml")));
        assert!(result.is_err());
    }
}
