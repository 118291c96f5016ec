//! Configuration types and loading.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Disk the lifecycle writes to when a record does not pin one.
    pub default_disk: String,
    /// Named disk definitions. Every disk a record references must be here.
    pub disks: HashMap<String, DiskConfig>,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
}

/// A single named storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskConfig {
    /// Filesystem root the backend resolves paths under.
    pub root: String,
    /// Public URL prefix for blobs on this disk.
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut disks = HashMap::new();
        disks.insert(
            "local".to_string(),
            DiskConfig {
                root: "/var/attache/files".to_string(),
                base_url: "/files".to_string(),
            },
        );

        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_body_size_bytes: 100 * 1024 * 1024, // 100MB
            },
            storage: StorageConfig {
                default_disk: "local".to_string(),
                disks,
                max_file_size: 256 * 1024 * 1024, // 256MB
            },
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Unknown disk referenced: {0}")]
    UnknownDisk(String),
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port.parse().unwrap_or(8080);
        }

        if let Ok(path) = std::env::var("ATTACHE_STORAGE_PATH") {
            if let Some(disk) = config.storage.disks.get_mut("local") {
                disk.root = path;
            }
        }
        if let Ok(url) = std::env::var("ATTACHE_STORAGE_BASE_URL") {
            if let Some(disk) = config.storage.disks.get_mut("local") {
                disk.base_url = url;
            }
        }
        if let Ok(disk) = std::env::var("ATTACHE_DEFAULT_DISK") {
            config.storage.default_disk = disk;
        }
        if let Ok(size) = std::env::var("ATTACHE_MAX_FILE_SIZE") {
            config.storage.max_file_size = size.parse().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "ATTACHE_MAX_FILE_SIZE".to_string(),
                    message: format!("not a byte count: {}", size),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// The default disk must exist in the disk table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.disks.contains_key(&self.storage.default_disk) {
            return Err(ConfigError::UnknownDisk(self.storage.default_disk.clone()));
        }
        Ok(())
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.default_disk, "local");
        assert!(config.storage.disks.contains_key("local"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_disk_rejected() {
        let mut config = AppConfig::default();
        config.storage.default_disk = "s3".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDisk(_))
        ));
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig::default();
        assert_eq!(config.server_addr().port(), 8080);
    }
}
