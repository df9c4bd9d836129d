//! stellar-custody - Custodial Stellar account and payment signing service
//!
//! A self-hosted service that:
//! - Issues Stellar keypairs and keeps their seeds in an encrypted store
//! - Enforces per-account spend limits and allow/deny lists
//! - Builds and signs payment transactions, optionally through a payment channel
//! - Exposes a line-delimited JSON interface over TCP
//!
//! # Security
//!
//! - Seeds are encrypted at rest using AES-256-GCM with Argon2id key derivation
//! - The store key is held in memory-locked pages to prevent swapping
//! - Seeds are decoded only for the duration of a signing call and zeroed on drop
//! - Seeds are never returned to callers
//!
//! # Usage
//!
//! ```bash
//! # Start the server
//! STELLAR_CUSTODY_MASTER_PASSWORD=your_password stellar-custody
//!
//! # Or with a config file
//! stellar-custody --config /etc/stellar-custody/config.toml
//! ```

mod api;
mod config;
mod crypto;
mod errors;
mod issuance;
mod ledger;
mod policy;
mod security;
mod signer;
mod store;
mod tx;

use crate::api::{Backend, CustodyServer};
use crate::config::{Config, StorageBackend, MASTER_PASSWORD_ENV};
use crate::errors::{CustodyError, Result};
use crate::ledger::{Faucet, Friendbot, HorizonClient, LedgerClient};
use crate::security::setup_memory_protection;
use crate::store::{EncryptedFileStore, KeyValueStore, MemoryStore};
use secrecy::SecretString;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let config_path = config_path_arg();
    let config = Config::load(config_path.as_deref())?;

    init_logging(&config);
    info!("Starting stellar-custody v{}", VERSION);

    config.validate()?;
    info!("Configuration loaded");

    // Disable core dumps before any secret is loaded
    setup_memory_protection(config.security.disable_core_dumps);

    // The blocking HTTP clients own a runtime of their own, so they are built
    // and dropped outside the async runtime.
    let backend = Arc::new(build_backend(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CustodyError::InternalError(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(serve(&config, backend.clone()))?;
    drop(runtime);

    info!("Server shut down gracefully");
    Ok(())
}

async fn serve(config: &Config, backend: Arc<Backend>) -> Result<()> {
    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CustodyError::ConfigError(format!("Cannot listen on {}: {}", addr, e)))?;

    CustodyServer::new(backend, config.server.max_connections)
        .run(listener, shutdown_signal())
        .await
}

fn build_backend(config: &Config) -> Result<Backend> {
    let network = config.network.network()?;
    info!("Signing for network \"{}\"", network.passphrase());

    let store: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, accounts will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            let path = config.storage.path.as_ref().ok_or_else(|| {
                CustodyError::ConfigError("storage.path not specified".to_string())
            })?;
            let password = get_master_password(config)?;
            info!("Opening encrypted store at {:?}", path);
            Arc::new(EncryptedFileStore::open(
                path,
                &password,
                config.security.enable_mlock,
            )?)
        }
    };

    let timeout = config.network.request_timeout();
    let ledger: Arc<dyn LedgerClient> =
        Arc::new(HorizonClient::new(&config.network.horizon_url, timeout)?);

    let faucet: Option<Arc<dyn Faucet>> = if config.funding_enabled() {
        Some(Arc::new(Friendbot::new(&config.network.friendbot_url, timeout)?))
    } else {
        None
    };

    Ok(Backend::new(
        store,
        ledger,
        faucet,
        network,
        config.network.base_fee,
    ))
}

/// `--config <path>` from the command line
fn config_path_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Initialize logging
fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Get master password from environment
fn get_master_password(config: &Config) -> Result<SecretString> {
    if let Ok(password) = env::var(MASTER_PASSWORD_ENV) {
        info!("Using master password from environment");
        return Ok(SecretString::new(password));
    }

    if !config.security.require_master_password {
        warn!("No master password provided, the store is encrypted under an empty password");
        return Ok(SecretString::new(String::new()));
    }

    Err(CustodyError::ConfigError(format!(
        "{} environment variable not set",
        MASTER_PASSWORD_ENV
    )))
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
