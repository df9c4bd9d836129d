//! Configuration management for stellar-custody
//!
//! Supports loading configuration from:
//! - Built-in defaults
//! - Config file (config.toml, /etc/stellar-custody/config or --config)
//! - Environment variables (STELLAR_CUSTODY_*, `__` between sections)

use crate::errors::{CustodyError, Result};
use crate::ledger::Network;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Environment variable holding the master password of the file store
pub const MASTER_PASSWORD_ENV: &str = "STELLAR_CUSTODY_MASTER_PASSWORD";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Ledger network configuration
    pub network: NetworkConfig,

    /// Security configuration
    pub security: SecurityConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Request server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for TCP
    pub listen_addr: String,

    /// Port number
    pub port: u16,

    /// Max concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 8750,
            max_connections: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Directory of the encrypted file store
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: Some(PathBuf::from("./data/accounts")),
        }
    }
}

/// Ledger network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `testnet` or `public`
    pub name: String,

    /// Explicit passphrase, overrides `name`
    pub passphrase: Option<String>,

    pub horizon_url: String,

    pub friendbot_url: String,

    /// Fee per operation, in stroops
    pub base_fee: u32,

    /// Ask the faucet to fund newly created accounts
    pub fund_new_accounts: bool,

    /// HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "testnet".to_string(),
            passphrase: None,
            horizon_url: "https://horizon-testnet.stellar.org".to_string(),
            friendbot_url: "https://friendbot.stellar.org".to_string(),
            base_fee: 100,
            fund_new_accounts: true,
            request_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn network(&self) -> Result<Network> {
        Network::from_config(&self.name, self.passphrase.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Enable memory locking
    pub enable_mlock: bool,

    /// Disable core dumps
    pub disable_core_dumps: bool,

    /// Refuse to start the file store without a master password
    pub require_master_password: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_mlock: true,
            disable_core_dumps: true,
            require_master_password: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Start with defaults
        let defaults = config::Config::try_from(&Config::default())
            .map_err(|e| CustodyError::ConfigError(e.to_string()))?;
        builder = builder.add_source(defaults);

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        } else {
            // Try default locations
            builder = builder
                .add_source(config::File::with_name("config").required(false))
                .add_source(config::File::with_name("/etc/stellar-custody/config").required(false));
        }

        // Load from environment (STELLAR_CUSTODY_SERVER__PORT, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("STELLAR_CUSTODY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| CustodyError::ConfigError(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CustodyError::ConfigError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(CustodyError::ConfigError(
                "File storage selected but storage.path not specified".to_string(),
            ));
        }

        if self.network.base_fee == 0 {
            return Err(CustodyError::ConfigError(
                "network.base_fee must be positive".to_string(),
            ));
        }

        let network = self.network.network()?;
        if network == Network::Public && self.network.fund_new_accounts {
            info!("Faucet funding is unavailable on the public network and will be skipped");
        }

        if let Some(path) = &self.storage.path {
            if self.storage.backend == StorageBackend::File && !path.exists() {
                info!("Store directory does not exist, will create: {:?}", path);
            }
        }

        Ok(())
    }

    /// Whether new accounts get faucet funding
    pub fn funding_enabled(&self) -> bool {
        self.network.fund_new_accounts
            && matches!(self.network.network(), Ok(Network::Testnet))
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }
}
