//! Server configuration.
//!
//! A `Config` can be built in code, taken from `Config::default()`, or
//! loaded from a TOML file. Limits are validated by `serve` at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tunables for a server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Set `SO_REUSEADDR` on the listening socket.
    #[serde(default = "default_reuse_address")]
    pub reuse_address: bool,

    /// Capacity of the connection pool. Connections accepted while the pool
    /// is full are closed immediately. Must be greater than 0.
    #[serde(default = "default_max_parallel_connections")]
    pub max_parallel_connections: usize,

    /// Listen backlog. Must be greater than 0.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Upper bound on the size of a request head. A head that exceeds this
    /// before its blank line arrives is answered with 431 and the
    /// connection is closed.
    #[serde(default = "default_max_head_size")]
    pub max_head_size: usize,

    /// Requests served on one connection before keep-alive is demoted.
    #[serde(default = "default_keep_alive_request_limit")]
    pub keep_alive_request_limit: u32,

    /// Pool-pressure ratio above which keep-alive is demoted.
    #[serde(default = "default_keep_alive_pressure")]
    pub keep_alive_pressure: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reuse_address: default_reuse_address(),
            max_parallel_connections: default_max_parallel_connections(),
            backlog: default_backlog(),
            max_head_size: default_max_head_size(),
            keep_alive_request_limit: default_keep_alive_request_limit(),
            keep_alive_pressure: default_keep_alive_pressure(),
        }
    }
}

fn default_reuse_address() -> bool {
    true
}

fn default_max_parallel_connections() -> usize {
    512
}

fn default_backlog() -> u32 {
    128
}

fn default_max_head_size() -> usize {
    64 * 1024
}

fn default_keep_alive_request_limit() -> u32 {
    20
}

fn default_keep_alive_pressure() -> f64 {
    0.6
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::TomlParse)
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(ConfigError::TomlParse)
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(e) => {
                write!(f, "Failed to parse config file: {e}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.reuse_address);
        assert_eq!(config.max_parallel_connections, 512);
        assert_eq!(config.backlog, 128);
        assert_eq!(config.max_head_size, 64 * 1024);
        assert_eq!(config.keep_alive_request_limit, 20);
        assert_eq!(config.keep_alive_pressure, 0.6);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            reuse_address = false
            max_parallel_connections = 64
            backlog = 16
            max_head_size = 8192
            keep_alive_request_limit = 5
            keep_alive_pressure = 0.5
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert!(!config.reuse_address);
        assert_eq!(config.max_parallel_connections, 64);
        assert_eq!(config.backlog, 16);
        assert_eq!(config.max_head_size, 8192);
        assert_eq!(config.keep_alive_request_limit, 5);
        assert_eq!(config.keep_alive_pressure, 0.5);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str("backlog = 7").unwrap();
        assert_eq!(config.backlog, 7);
        assert_eq!(config.max_parallel_connections, 512);
        assert!(config.reuse_address);
    }
}
