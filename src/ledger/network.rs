//! Network selection and network ids

use crate::errors::{CustodyError, Result};
use sha2::{Digest, Sha256};

pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// The network transactions are signed for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Network {
    #[default]
    Testnet,
    Public,
    Custom(String),
}

impl Network {
    /// Resolve a configured network name, or an explicit passphrase override
    pub fn from_config(name: &str, passphrase: Option<&str>) -> Result<Self> {
        if let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) {
            return Ok(match passphrase {
                TESTNET_PASSPHRASE => Network::Testnet,
                PUBLIC_PASSPHRASE => Network::Public,
                other => Network::Custom(other.to_string()),
            });
        }

        match name.to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "public" | "pubnet" | "mainnet" => Ok(Network::Public),
            other => Err(CustodyError::ConfigError(format!(
                "Unknown network '{}', expected testnet or public",
                other
            ))),
        }
    }

    pub fn passphrase(&self) -> &str {
        match self {
            Network::Testnet => TESTNET_PASSPHRASE,
            Network::Public => PUBLIC_PASSPHRASE,
            Network::Custom(passphrase) => passphrase,
        }
    }

    /// SHA-256 of the passphrase, the prefix of every signature payload
    pub fn network_id(&self) -> [u8; 32] {
        Sha256::digest(self.passphrase().as_bytes()).into()
    }
}
