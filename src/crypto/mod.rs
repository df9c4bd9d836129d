//! Cryptographic utilities for Stellar keys

pub mod keypair;

#[cfg(test)]
pub use keypair::verify_signature;
pub use keypair::{is_valid_address, parse_address, StellarKeyPair};
