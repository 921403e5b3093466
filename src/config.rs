//! Configuration management for RAX Store
//!
//! Values come from built-in defaults, an optional `config.toml` in the working
//! directory, and `RAX_STORE_*` environment variables, in increasing priority.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    // ═══ NETWORK ═══
    /// IP address the listener binds to
    pub bind_address: String,

    /// TCP port for client connections
    pub port: u16,

    /// Maximum number of simultaneously connected clients
    pub max_clients: usize,

    /// Idle limit for a single frame read, in seconds
    pub read_timeout_secs: u64,

    // ═══ STORAGE ═══
    /// Directory holding one sub-directory per user id
    pub storage_root: String,

    /// JSON file holding credential records
    pub users_file: String,

    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,

    /// Maximum logical path length in characters
    pub max_path_length: usize,

    // ═══ PROTOCOL ═══
    /// Chunk size for data frame reads and writes
    pub chunk_size: usize,

    /// Largest control frame payload accepted from a client
    pub max_control_frame_size: usize,

    // ═══ ACCOUNTS ═══
    pub min_password_length: usize,
    pub max_login_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            max_clients: 100,
            read_timeout_secs: 300,
            storage_root: "./storage".to_string(),
            users_file: "./users.json".to_string(),
            max_file_size: 1024 * 1024 * 1024,
            max_path_length: 4096,
            chunk_size: 64 * 1024,
            max_control_frame_size: 1024 * 1024,
            min_password_length: 6,
            max_login_length: 50,
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("RAX_STORE").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage_root.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        if self.users_file.is_empty() {
            return Err(config::ConfigError::Message(
                "users_file cannot be empty".into(),
            ));
        }

        let non_zero = [
            ("chunk_size", self.chunk_size as u64),
            ("max_file_size", self.max_file_size),
            ("max_control_frame_size", self.max_control_frame_size as u64),
            ("read_timeout_secs", self.read_timeout_secs),
            ("min_password_length", self.min_password_length as u64),
            ("max_login_length", self.max_login_length as u64),
            ("max_path_length", self.max_path_length as u64),
            ("max_clients", self.max_clients as u64),
        ];

        for (key, value) in non_zero {
            if value == 0 {
                return Err(config::ConfigError::Message(format!(
                    "{key} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn users_file_path(&self) -> PathBuf {
        PathBuf::from(&self.users_file)
    }

    /// Get read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_address(), "127.0.0.1:8000");
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = ServerConfig {
            chunk_size: 0,
            ..ServerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_empty_storage_root_rejected() {
        let config = ServerConfig {
            storage_root: String::new(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
