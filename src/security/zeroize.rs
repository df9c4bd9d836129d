//! Secure memory zeroization utilities
//!
//! Wrappers for secret seeds and key bytes that zero their memory on drop and
//! never print their contents.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A wrapper for sensitive byte arrays that automatically zeros memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { inner: data }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    pub fn zeroize_now(&mut self) {
        self.inner.zeroize();
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.inner.len())
    }
}

/// A secure string that zeros its memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_bytes_zeroize() {
        let mut secure = SecureBytes::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(secure.expose(), &[1, 2, 3, 4, 5]);

        secure.zeroize_now();
        // Vec::zeroize() clears the vector (sets len to 0) after zeroing memory
        assert!(secure.is_empty());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecureString::new("SAAQCAIBAEAQCAIB".to_string());
        assert_eq!(format!("{:?}", secret), "SecureString([REDACTED])");
        assert_eq!(secret.expose(), "SAAQCAIBAEAQCAIB");

        let bytes = SecureBytes::from(vec![9u8; 32]);
        assert_eq!(format!("{:?}", bytes), "SecureBytes([REDACTED; 32])");
    }
}
