//! Stellar key pairs
//!
//! Provides:
//! - Ed25519 key generation
//! - Strkey address/seed encoding
//! - Message signing and signature hints

use crate::errors::{CustodyError, Result};
use crate::security::SecureString;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use stellar_strkey::ed25519;
use zeroize::Zeroize;

/// Stellar key pair (Ed25519)
pub struct StellarKeyPair {
    signing_key: SigningKey,
}

impl StellarKeyPair {
    /// Create a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from raw private key bytes (32 bytes seed)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CustodyError::SigningFailure(format!(
                "Expected 32 bytes seed, got {}",
                bytes.len()
            )));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);

        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Parse an `S...` secret seed
    pub fn from_secret_seed(seed: &str) -> Result<Self> {
        let mut raw = ed25519::PrivateKey::from_string(seed)
            .map_err(|_| CustodyError::SigningFailure("Malformed secret seed".to_string()))?;
        let keypair = Self::from_bytes(&raw.0);
        raw.0.zeroize();
        keypair
    }

    /// Get the public key (32 bytes)
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Get the `G...` account address
    pub fn address(&self) -> String {
        ed25519::PublicKey(self.public_key()).to_string()
    }

    /// Export the `S...` secret seed - use with caution!
    pub fn secret_seed(&self) -> SecureString {
        let mut key = ed25519::PrivateKey(self.signing_key.to_bytes());
        let seed = SecureString::new(key.to_string());
        key.0.zeroize();
        seed
    }

    /// Last four bytes of the public key, attached to every signature
    pub fn signature_hint(&self) -> [u8; 4] {
        let public_key = self.public_key();
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&public_key[28..]);
        hint
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for StellarKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StellarKeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Parse a `G...` account address into its public key
pub fn parse_address(s: &str) -> Result<[u8; 32]> {
    ed25519::PublicKey::from_string(s)
        .map(|key| key.0)
        .map_err(|_| CustodyError::InvalidAddress(s.to_string()))
}

/// Check whether `s` is a well-formed account address
pub fn is_valid_address(s: &str) -> bool {
    parse_address(s).is_ok()
}

/// Verify a signature
#[cfg(test)]
pub fn verify_signature(pubkey: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<bool> {
    use ed25519_dalek::{Signature, VerifyingKey};

    let verifying_key = VerifyingKey::from_bytes(pubkey)
        .map_err(|e| CustodyError::InvalidAddress(e.to_string()))?;

    let sig = Signature::from_bytes(signature);

    Ok(verifying_key.verify_strict(message, &sig).is_ok())
}
