//! Security utilities for memory protection and secure handling
//!
//! This module provides:
//! - Memory zeroization to securely erase seeds and key bytes
//! - Memory locking to prevent swap
//! - Process hardening at startup

pub mod mlock;
pub mod zeroize;

pub use mlock::{setup_memory_protection, LockedMemory};
pub use zeroize::{SecureBytes, SecureString};
