//! Account store adapter
//!
//! Typed access to account records kept under `accounts/<name>` in any
//! `KeyValueStore`. The read path returns public fields only; the secret seed
//! is handed out solely as part of a `ResolvedAccount`, which zeroes it when
//! the signing step that needed it is over.

use crate::crypto::StellarKeyPair;
use crate::errors::{CustodyError, Result};
use crate::policy::AccountPolicy;
use crate::security::SecureString;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Storage prefix for account records
pub const ACCOUNTS_PREFIX: &str = "accounts/";

/// Canonical storage path of an account record
pub fn account_path(name: &str) -> String {
    format!("{}{}", ACCOUNTS_PREFIX, name)
}

/// Account record as persisted
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct AccountRecord {
    address: String,
    seed: String,
    /// Public key the account was created with
    account_id: String,
    tx_spend_limit: String,
    #[serde(default)]
    whitelist: Vec<String>,
    #[serde(default)]
    blacklist: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Public view of a stored account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub address: String,
    pub account_id: String,
    pub policy: AccountPolicy,
    pub created_at: Option<DateTime<Utc>>,
}

/// An account together with its secret seed, for the duration of one request
pub struct ResolvedAccount {
    pub account: Account,
    seed: SecureString,
}

impl ResolvedAccount {
    /// Materialize the signing key; drop it as soon as signing is done
    pub fn keypair(&self) -> Result<StellarKeyPair> {
        StellarKeyPair::from_secret_seed(self.seed.expose())
    }

    pub fn address(&self) -> &str {
        &self.account.address
    }

    pub fn name(&self) -> &str {
        &self.account.name
    }
}

impl std::fmt::Debug for ResolvedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAccount")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Typed account access over a key-value store
#[derive(Clone)]
pub struct AccountStore {
    store: Arc<dyn KeyValueStore>,
}

impl AccountStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Write the account record for `name`, replacing any existing one
    pub fn upsert(
        &self,
        name: &str,
        keypair: &StellarKeyPair,
        policy: &AccountPolicy,
        created_at: DateTime<Utc>,
    ) -> Result<Account> {
        let address = keypair.address();
        let record = AccountRecord {
            address: address.clone(),
            seed: keypair.secret_seed().expose().to_string(),
            account_id: address,
            tx_spend_limit: policy.tx_spend_limit.to_string(),
            whitelist: policy.whitelist.clone(),
            blacklist: policy.blacklist.clone(),
            created_at: Some(created_at.to_rfc3339()),
        };

        let mut bytes = serde_json::to_vec(&record)?;
        let result = self.store.put(&account_path(name), &bytes);
        bytes.zeroize();
        result?;

        debug!("Stored account record {}", name);
        to_account(name, &record)
    }

    /// Read the public fields of `name`, if it exists
    pub fn get(&self, name: &str) -> Result<Option<Account>> {
        match self.read_record(name)? {
            Some(record) => to_account(name, &record).map(Some),
            None => Ok(None),
        }
    }

    /// Load `name` with its seed; absence is `AccountNotFound`
    pub fn resolve(&self, name: &str) -> Result<ResolvedAccount> {
        let record = self
            .read_record(name)?
            .ok_or_else(|| CustodyError::AccountNotFound(name.to_string()))?;

        Ok(ResolvedAccount {
            account: to_account(name, &record)?,
            seed: SecureString::new(record.seed.clone()),
        })
    }

    /// Names of all stored accounts
    pub fn list(&self) -> Result<Vec<String>> {
        self.store.list(ACCOUNTS_PREFIX)
    }

    fn read_record(&self, name: &str) -> Result<Option<AccountRecord>> {
        let path = account_path(name);
        debug!("Reading account from path: {}", path);

        let Some(bytes) = self.store.get(&path)? else {
            return Ok(None);
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(bytes.expose())
            .map(Some)
            .map_err(|e| CustodyError::StorageFailure(format!("failed to deserialize account at {}: {}", path, e)))
    }
}

fn to_account(name: &str, record: &AccountRecord) -> Result<Account> {
    let tx_spend_limit = record.tx_spend_limit.parse::<BigUint>().map_err(|_| {
        CustodyError::StorageFailure(format!("Corrupt spend limit in account {}", name))
    })?;

    let created_at = match &record.created_at {
        Some(ts) => Some(
            DateTime::parse_from_rfc3339(ts)
                .map_err(|e| CustodyError::StorageFailure(e.to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(Account {
        name: name.to_string(),
        address: record.address.clone(),
        account_id: record.account_id.clone(),
        policy: AccountPolicy {
            tx_spend_limit,
            whitelist: record.whitelist.clone(),
            blacklist: record.blacklist.clone(),
        },
        created_at,
    })
}
