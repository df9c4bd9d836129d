//! Encrypted on-disk key-value store
//!
//! Every value is sealed with AES-256-GCM under a key derived once, at open
//! time, from the master password with Argon2id. Each path maps to one JSON
//! file under the store directory; writes go through a temporary file and a
//! rename so readers never observe a partial record.

use crate::errors::{CustodyError, Result};
use crate::security::{LockedMemory, SecureBytes};
use crate::store::{check_path, KeyValueStore};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Salt size for Argon2
const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// Store metadata file, holding the KDF salt and a password verifier
const META_FILE: &str = "store.meta.json";

/// Plaintext sealed into the verifier
const VERIFIER_PLAINTEXT: &[u8] = b"stellar-custody";

/// A sealed value as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedValue {
    /// Version of the encryption format
    version: u32,

    /// Nonce for AES-GCM (base64)
    nonce: String,

    /// Encrypted value (base64)
    ciphertext: String,
}

/// Store-wide metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreMeta {
    version: u32,

    /// Salt for key derivation (base64)
    salt: String,

    /// Known plaintext sealed under the derived key
    verifier: SealedValue,

    /// Creation timestamp
    created_at: i64,
}

/// Encrypted file-backed store
pub struct EncryptedFileStore {
    base_path: PathBuf,
    key: LockedMemory,
}

impl EncryptedFileStore {
    /// Open (or initialize) a store at `base_path`
    pub fn open(
        base_path: impl AsRef<Path>,
        password: &SecretString,
        lock_memory: bool,
    ) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        let meta_path = base_path.join(META_FILE);
        let store = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
            let salt = BASE64.decode(&meta.salt)?;
            let key = derive_key(password.expose_secret(), &salt)?;
            let store = Self {
                base_path,
                key: LockedMemory::from_vec(key.to_vec(), lock_memory),
            };

            store.unseal(&meta.verifier).map_err(|_| {
                CustodyError::ConfigError("Wrong master password for store".to_string())
            })?;
            debug!("Opened encrypted store at {:?}", store.base_path);
            store
        } else {
            let mut salt = [0u8; SALT_SIZE];
            rand::thread_rng().fill_bytes(&mut salt);
            let key = derive_key(password.expose_secret(), &salt)?;
            let store = Self {
                base_path,
                key: LockedMemory::from_vec(key.to_vec(), lock_memory),
            };

            let meta = StoreMeta {
                version: FORMAT_VERSION,
                salt: BASE64.encode(salt),
                verifier: store.seal(VERIFIER_PLAINTEXT)?,
                created_at: chrono::Utc::now().timestamp(),
            };
            write_atomic(&meta_path, serde_json::to_string_pretty(&meta)?.as_bytes())?;
            info!("Initialized encrypted store at {:?}", store.base_path);
            store
        };

        debug!("Store key locked in memory: {}", store.key.is_locked());
        Ok(store)
    }

    /// Get the file path for a storage path
    fn value_path(&self, path: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", path))
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|e| CustodyError::StorageFailure(e.to_string()))
    }

    fn seal(&self, plaintext: &[u8]) -> Result<SealedValue> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CustodyError::StorageFailure(format!("Encryption failed: {}", e)))?;

        Ok(SealedValue {
            version: FORMAT_VERSION,
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    fn unseal(&self, sealed: &SealedValue) -> Result<SecureBytes> {
        if sealed.version != FORMAT_VERSION {
            return Err(CustodyError::StorageFailure(format!(
                "Unsupported record version {}",
                sealed.version
            )));
        }

        let nonce_bytes = BASE64.decode(&sealed.nonce)?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CustodyError::StorageFailure("Invalid nonce".to_string()));
        }
        let ciphertext = BASE64.decode(&sealed.ciphertext)?;

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| {
                CustodyError::StorageFailure("Decryption failed - wrong password?".to_string())
            })?;

        Ok(SecureBytes::new(plaintext))
    }
}

impl KeyValueStore for EncryptedFileStore {
    fn get(&self, path: &str) -> Result<Option<SecureBytes>> {
        check_path(path)?;
        let file = self.value_path(path);
        if !file.exists() {
            return Ok(None);
        }

        let sealed: SealedValue = serde_json::from_str(&fs::read_to_string(&file)?)?;
        self.unseal(&sealed).map(Some)
    }

    fn put(&self, path: &str, value: &[u8]) -> Result<()> {
        check_path(path)?;
        let file = self.value_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }

        let sealed = self.seal(value)?;
        write_atomic(&file, serde_json::to_string_pretty(&sealed)?.as_bytes())?;
        debug!("Stored sealed value at {}", path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = if prefix.is_empty() {
            self.base_path.clone()
        } else {
            check_path(prefix)?;
            self.base_path.join(prefix.trim_end_matches('/'))
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            if path.is_dir() {
                names.push(format!("{}/", name));
            } else if let Some(stem) = name.strip_suffix(".json") {
                if name != META_FILE {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Derive an encryption key from a password using Argon2id
fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(
        65536, // 64 MB memory
        3,     // 3 iterations
        4,     // 4 parallel lanes
        Some(32),
    )
    .map_err(|e| CustodyError::StorageFailure(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| CustodyError::StorageFailure(e.to_string()))?;

    Ok(output)
}

/// Write through a sibling temp file and rename into place
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{:016x}.tmp", rand::random::<u64>()));
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn password(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let store = EncryptedFileStore::open(dir.path(), &password("pw"), false).unwrap();

        store.put("accounts/acc1", b"{\"seed\":\"S...\"}").unwrap();
        let value = store.get("accounts/acc1").unwrap().unwrap();
        assert_eq!(value.expose(), b"{\"seed\":\"S...\"}");

        // Nothing is stored in plaintext
        let raw = fs::read_to_string(dir.path().join("accounts/acc1.json")).unwrap();
        assert!(!raw.contains("seed"));
    }

    #[test]
    fn test_missing_value() {
        let dir = tempdir().unwrap();
        let store = EncryptedFileStore::open(dir.path(), &password("pw"), false).unwrap();
        assert!(store.get("accounts/nobody").unwrap().is_none());
    }

    #[test]
    fn test_reopen_and_wrong_password() {
        let dir = tempdir().unwrap();
        {
            let store = EncryptedFileStore::open(dir.path(), &password("correct"), false).unwrap();
            store.put("accounts/acc1", b"v1").unwrap();
        }

        let store = EncryptedFileStore::open(dir.path(), &password("correct"), false).unwrap();
        assert_eq!(store.get("accounts/acc1").unwrap().unwrap().expose(), b"v1");

        let result = EncryptedFileStore::open(dir.path(), &password("wrong"), false);
        assert!(matches!(result, Err(CustodyError::ConfigError(_))));
    }

    #[test]
    fn test_list_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = EncryptedFileStore::open(dir.path(), &password("pw"), false).unwrap();

        store.put("accounts/b", b"1").unwrap();
        store.put("accounts/a", b"1").unwrap();
        store.put("accounts/a", b"2").unwrap();

        assert_eq!(store.list("accounts/").unwrap(), vec!["a", "b"]);
        assert_eq!(store.list("").unwrap(), vec!["accounts/"]);
        assert_eq!(store.get("accounts/a").unwrap().unwrap().expose(), b"2");
    }

    #[test]
    fn test_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = EncryptedFileStore::open(dir.path(), &password("pw"), false).unwrap();
        assert!(store.put("accounts/../../escape", b"x").is_err());
    }
}
