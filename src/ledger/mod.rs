//! Ledger network collaborators
//!
//! The engine reaches the Stellar network only through the two traits here:
//! `LedgerClient` for sequence numbers and submission, `Faucet` for funding
//! freshly issued test accounts.

pub mod horizon;
pub mod network;

pub use horizon::{Friendbot, HorizonClient};
pub use network::Network;

use crate::errors::Result;
use serde::Serialize;

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    pub hash: String,
    pub ledger: u32,
}

/// Read and write access to the ledger
pub trait LedgerClient: Send + Sync {
    /// Current sequence number of `address`
    fn sequence_for(&self, address: &str) -> Result<i64>;

    /// Submit a base64 transaction envelope
    fn submit(&self, envelope_b64: &str) -> Result<SubmitResult>;
}

/// Funds new accounts on networks that have a faucet
pub trait Faucet: Send + Sync {
    fn fund(&self, address: &str, starting_balance: Option<&str>) -> Result<()>;
}
