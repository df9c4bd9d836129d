//! In-memory key-value store
//!
//! Holds values in process memory. Used by tests and by deployments that run
//! with `storage.backend = "memory"`; nothing survives a restart.

use crate::errors::{CustodyError, Result};
use crate::security::SecureBytes;
use crate::store::{check_path, direct_children, KeyValueStore};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;
use zeroize::Zeroize;

/// In-memory store
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<SecureBytes>> {
        check_path(path)?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(path).map(|v| SecureBytes::new(v.clone())))
    }

    fn put(&self, path: &str, value: &[u8]) -> Result<()> {
        check_path(path)?;
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if let Some(mut old) = entries.insert(path.to_string(), value.to_vec()) {
            old.zeroize();
        }
        debug!("Stored {} bytes at {}", value.len(), path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(direct_children(prefix, entries.keys().map(String::as_str)))
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Ok(entries) = self.entries.get_mut() {
            for value in entries.values_mut() {
                value.zeroize();
            }
        }
    }
}

fn poisoned() -> CustodyError {
    CustodyError::StorageFailure("store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let store = MemoryStore::new();
        assert!(store.get("accounts/a").unwrap().is_none());

        store.put("accounts/a", b"one").unwrap();
        assert_eq!(store.get("accounts/a").unwrap().unwrap().expose(), b"one");
    }

    #[test]
    fn test_last_writer_wins() {
        let store = MemoryStore::new();
        store.put("accounts/a", b"one").unwrap();
        store.put("accounts/a", b"two").unwrap();

        assert_eq!(store.get("accounts/a").unwrap().unwrap().expose(), b"two");
        assert_eq!(store.list("accounts/").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_list() {
        let store = MemoryStore::new();
        store.put("accounts/b", b"x").unwrap();
        store.put("accounts/a", b"x").unwrap();
        store.put("payments/p", b"x").unwrap();

        assert_eq!(store.list("accounts/").unwrap(), vec!["a", "b"]);
        assert!(store.list("missing/").unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_disjoint_writes() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.put(&format!("accounts/acc{}", i), b"v").unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.list("accounts/").unwrap().len(), 8);
    }
}
