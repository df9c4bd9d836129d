//! Account issuance
//!
//! Generates custodial keypairs, persists them with their policy and then asks
//! the faucet, if one is configured, to fund the new address. Funding is best
//! effort: once the record is stored the request has succeeded.

use crate::crypto::{is_valid_address, StellarKeyPair};
use crate::errors::{CustodyError, Result};
use crate::ledger::Faucet;
use crate::policy::AccountPolicy;
use crate::store::{Account, AccountStore};
use chrono::Utc;
use num_bigint::BigUint;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters of a create (or re-create) request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAccount {
    /// Requested starting balance, a non-negative decimal
    pub xlm_balance: Option<String>,
    /// Non-negative integer, `"0"` for unlimited
    pub tx_spend_limit: String,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

pub struct AccountIssuer {
    accounts: AccountStore,
    faucet: Option<Arc<dyn Faucet>>,
}

impl AccountIssuer {
    pub fn new(accounts: AccountStore, faucet: Option<Arc<dyn Faucet>>) -> Self {
        Self { accounts, faucet }
    }

    /// Create or overwrite the account `name`
    pub fn create_account(&self, name: &str, params: &NewAccount) -> Result<Account> {
        let tx_spend_limit = parse_spend_limit(&params.tx_spend_limit)?;
        let whitelist = normalize_addresses(&params.whitelist)?;
        let blacklist = normalize_addresses(&params.blacklist)?;
        let xlm_balance = match params.xlm_balance.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(balance) if is_decimal(balance) => Some(balance),
            Some(balance) => {
                return Err(CustodyError::InvalidAmount(format!(
                    "xlm_balance '{}' is not a non-negative number",
                    balance
                )))
            }
        };

        let keypair = StellarKeyPair::generate();
        let policy = AccountPolicy {
            tx_spend_limit,
            whitelist,
            blacklist,
        };
        let account = self.accounts.upsert(name, &keypair, &policy, Utc::now())?;
        drop(keypair);
        info!("Created account {} with address {}", name, account.address);

        if let Some(faucet) = &self.faucet {
            if let Err(e) = faucet.fund(&account.address, xlm_balance) {
                warn!("Funding of account {} failed: {}", account.address, e);
            }
        }

        Ok(account)
    }
}

fn parse_spend_limit(raw: &str) -> Result<BigUint> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(BigUint::default());
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CustodyError::InvalidSpendLimit(raw.to_string()));
    }
    BigUint::from_str(raw).map_err(|_| CustodyError::InvalidSpendLimit(raw.to_string()))
}

/// Trim entries, drop empty ones and require valid account addresses
fn normalize_addresses(entries: &[String]) -> Result<Vec<String>> {
    entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|e| {
            if is_valid_address(e) {
                Ok(e.to_string())
            } else {
                Err(CustodyError::InvalidAddress(e.to_string()))
            }
        })
        .collect()
}

fn is_decimal(s: &str) -> bool {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    (!whole.is_empty() || !frac.is_empty()) && digits(whole) && digits(frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fake::FakeFaucet;
    use crate::store::MemoryStore;

    fn issuer(faucet: Option<Arc<dyn Faucet>>) -> (AccountStore, AccountIssuer) {
        let accounts = AccountStore::new(Arc::new(MemoryStore::new()));
        (accounts.clone(), AccountIssuer::new(accounts, faucet))
    }

    fn address(byte: u8) -> String {
        stellar_strkey::ed25519::PublicKey([byte; 32]).to_string()
    }

    #[test]
    fn test_create_account() {
        let faucet = Arc::new(FakeFaucet::default());
        let (accounts, issuer) = issuer(Some(faucet.clone() as Arc<dyn Faucet>));

        let params = NewAccount {
            xlm_balance: Some("50".to_string()),
            tx_spend_limit: "100".to_string(),
            whitelist: vec![format!(" {} ", address(2)), String::new()],
            blacklist: vec![],
        };
        let account = issuer.create_account("acc1", &params).unwrap();

        assert!(account.address.starts_with('G'));
        assert_eq!(account.account_id, account.address);
        assert_eq!(account.policy.tx_spend_limit, BigUint::from(100u32));
        assert_eq!(account.policy.whitelist, vec![address(2)]);
        assert!(account.created_at.is_some());
        assert_eq!(accounts.get("acc1").unwrap().unwrap(), account);
        assert_eq!(*faucet.funded.lock().unwrap(), vec![account.address.clone()]);
    }

    #[test]
    fn test_recreate_overwrites() {
        let (accounts, issuer) = issuer(None);

        let first = issuer
            .create_account(
                "a",
                &NewAccount {
                    tx_spend_limit: "10".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let second = issuer
            .create_account(
                "a",
                &NewAccount {
                    tx_spend_limit: "20".to_string(),
                    blacklist: vec![address(4)],
                    ..Default::default()
                },
            )
            .unwrap();

        let stored = accounts.get("a").unwrap().unwrap();
        assert_eq!(stored, second);
        assert_ne!(stored.address, first.address);
        assert_eq!(stored.policy.tx_spend_limit, BigUint::from(20u32));
        assert_eq!(stored.policy.blacklist, vec![address(4)]);
    }

    #[test]
    fn test_funding_failure_is_not_fatal() {
        let faucet = Arc::new(FakeFaucet {
            fail: true,
            ..Default::default()
        });
        let (accounts, issuer) = issuer(Some(faucet as Arc<dyn Faucet>));

        assert!(issuer.create_account("a", &NewAccount::default()).is_ok());
        assert!(accounts.get("a").unwrap().is_some());
    }

    #[test]
    fn test_rejects_bad_spend_limit() {
        let (accounts, issuer) = issuer(None);
        for limit in ["-5", "abc", "1.5"] {
            let params = NewAccount {
                tx_spend_limit: limit.to_string(),
                ..Default::default()
            };
            assert!(matches!(
                issuer.create_account("a", &params),
                Err(CustodyError::InvalidSpendLimit(_))
            ));
        }
        assert!(accounts.get("a").unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_addresses_and_balance() {
        let (_, issuer) = issuer(None);

        let params = NewAccount {
            whitelist: vec!["not-an-address".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            issuer.create_account("a", &params),
            Err(CustodyError::InvalidAddress(_))
        ));

        let params = NewAccount {
            xlm_balance: Some("-1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            issuer.create_account("a", &params),
            Err(CustodyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_is_decimal() {
        assert!(is_decimal("10"));
        assert!(is_decimal("10.5"));
        assert!(is_decimal(".5"));
        assert!(!is_decimal("."));
        assert!(!is_decimal("1e5"));
        assert!(!is_decimal("1.2.3"));
    }
}
