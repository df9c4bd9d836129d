//! Secret storage
//!
//! This module provides:
//! - The `KeyValueStore` capability the engine persists through
//! - An in-memory store (tests, ephemeral deployments)
//! - An encrypted on-disk store
//! - The typed account adapter on top of any store

pub mod accounts;
pub mod encrypted;
pub mod memory;

pub use accounts::{Account, AccountStore, ResolvedAccount};
pub use encrypted::EncryptedFileStore;
pub use memory::MemoryStore;

use crate::errors::{CustodyError, Result};
use crate::security::SecureBytes;

/// Opaque hierarchical key-value storage
///
/// Paths are `/`-separated strings. Implementations must give at least
/// last-writer-wins semantics for concurrent `put`s to the same path and must
/// never expose a partially written value.
pub trait KeyValueStore: Send + Sync {
    /// Read the value at `path`, if any
    fn get(&self, path: &str) -> Result<Option<SecureBytes>>;

    /// Write (or overwrite) the value at `path`
    fn put(&self, path: &str, value: &[u8]) -> Result<()>;

    /// List the direct children of `prefix`; nested folders end with `/`
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Reject empty segments and relative components in a storage path
pub(crate) fn check_path(path: &str) -> Result<()> {
    if path.is_empty() || path.starts_with('/') {
        return Err(CustodyError::StorageFailure(format!(
            "Invalid storage path: {:?}",
            path
        )));
    }

    for segment in path.trim_end_matches('/').split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(CustodyError::StorageFailure(format!(
                "Invalid storage path: {:?}",
                path
            )));
        }
    }

    Ok(())
}

/// Reduce full keys under `prefix` to their direct children, sorted and deduplicated
pub(crate) fn direct_children<'a>(prefix: &str, keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut children: Vec<String> = keys
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.find('/') {
            Some(idx) => rest[..=idx].to_string(),
            None => rest.to_string(),
        })
        .collect();
    children.sort();
    children.dedup();
    children
}
