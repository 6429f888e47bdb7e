//! Server configuration
//!
//! JSON config file with serde defaults; the binary applies CLI overrides on
//! top. Running without a config file uses [`TernConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tern_core::{DEFAULT_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY};

use crate::error::{TernError, TernResult};

/// Complete Tern server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TernConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Size of the single read each connection gets (default: 10KB)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Connections served at once; the rest are answered 503
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for TernConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
            buffer_capacity: default_buffer_capacity(),
            max_connections: default_max_connections(),
        }
    }
}

impl TernConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TernResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TernError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config = serde_json::from_str(&content)
            .map_err(|e| TernError::Config(format!("Failed to parse config JSON: {}", e)))?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> TernResult<()> {
        if self.port == 0 {
            return Err(TernError::Config("Port must be > 0".to_string()));
        }
        if self.hostname.is_empty() {
            return Err(TernError::Config("Hostname cannot be empty".to_string()));
        }
        if self.buffer_capacity == 0 || self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(TernError::Config(format!(
                "Buffer capacity must be between 1 and {} bytes",
                MAX_BUFFER_CAPACITY
            )));
        }
        if self.max_connections == 0 {
            return Err(TernError::Config("Max connections must be > 0".to_string()));
        }
        Ok(())
    }

    /// Get socket address as string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

fn default_port() -> u16 { 8080 }
fn default_hostname() -> String { "127.0.0.1".to_string() }
fn default_buffer_capacity() -> usize { DEFAULT_BUFFER_CAPACITY }
fn default_max_connections() -> usize { 1024 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TernConfig::new();
        assert_eq!(config.buffer_capacity, 10 * 1024);
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "port": 9000, "buffer_capacity": 2048 }}"#).unwrap();

        let config = TernConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.buffer_capacity, 2048);
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.max_connections, 1024);
    }

    #[test]
    fn test_from_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(TernConfig::from_file(file.path()), Err(TernError::Config(_))));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(TernConfig::from_file(missing), Err(TernError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let too_big = TernConfig {
            buffer_capacity: MAX_BUFFER_CAPACITY + 1,
            ..TernConfig::default()
        };
        assert!(too_big.validate().is_err());

        let no_port = TernConfig {
            port: 0,
            ..TernConfig::default()
        };
        assert!(no_port.validate().is_err());

        let no_slots = TernConfig {
            max_connections: 0,
            ..TernConfig::default()
        };
        assert!(no_slots.validate().is_err());
    }
}
