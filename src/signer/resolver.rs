//! Signer resolution
//!
//! Decides which stored accounts sign a payment and which one pays the fee.

use crate::errors::{CustodyError, Result};
use crate::store::{AccountStore, ResolvedAccount};
use tracing::debug;

/// Accounts whose keys sign one transfer
#[derive(Debug)]
pub struct ResolvedSigners {
    source: ResolvedAccount,
    /// Distinct fee-paying channel, if any
    channel: Option<ResolvedAccount>,
}

impl ResolvedSigners {
    pub fn source(&self) -> &ResolvedAccount {
        &self.source
    }

    /// Address that pays the fee and supplies the sequence number
    pub fn fee_source_address(&self) -> &str {
        self.channel
            .as_ref()
            .map_or_else(|| self.source.address(), |c| c.address())
    }

    /// Signing accounts in signature order: source, then channel
    pub fn signers(&self) -> Vec<&ResolvedAccount> {
        std::iter::once(&self.source)
            .chain(self.channel.as_ref())
            .collect()
    }
}

#[derive(Clone)]
pub struct SignerResolver {
    accounts: AccountStore,
}

impl SignerResolver {
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }

    /// Resolve the channel and additional signers around an already resolved source
    ///
    /// Additional signers must exist but never sign: the ledger rejects
    /// transactions that carry signatures its signer weights do not expect.
    pub fn resolve_signers(
        &self,
        source: ResolvedAccount,
        payment_channel: Option<&str>,
        additional_signers: &[String],
    ) -> Result<ResolvedSigners> {
        let channel = match payment_channel {
            Some(name) => {
                let channel = self.accounts.resolve(name)?;
                if channel.address() == source.address() {
                    None
                } else {
                    Some(channel)
                }
            }
            None => None,
        };

        for name in additional_signers {
            if self.accounts.get(name)?.is_none() {
                return Err(CustodyError::AccountNotFound(name.clone()));
            }
        }
        if !additional_signers.is_empty() {
            debug!(
                "Additional signers {:?} resolved but not signing",
                additional_signers
            );
        }

        Ok(ResolvedSigners { source, channel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StellarKeyPair;
    use crate::policy::AccountPolicy;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn setup(names: &[&str]) -> AccountStore {
        let accounts = AccountStore::new(Arc::new(MemoryStore::new()));
        for name in names {
            accounts
                .upsert(name, &StellarKeyPair::generate(), &AccountPolicy::default(), Utc::now())
                .unwrap();
        }
        accounts
    }

    fn names(signers: &ResolvedSigners) -> Vec<&str> {
        signers.signers().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_without_channel() {
        let accounts = setup(&["src", "extra"]);
        let resolver = SignerResolver::new(accounts.clone());

        let source = accounts.resolve("src").unwrap();
        let source_address = source.address().to_string();
        let signers = resolver
            .resolve_signers(source, None, &["extra".to_string()])
            .unwrap();

        assert_eq!(names(&signers), vec!["src"]);
        assert_eq!(signers.fee_source_address(), source_address);
    }

    #[test]
    fn test_with_channel() {
        let accounts = setup(&["src", "chan", "extra"]);
        let resolver = SignerResolver::new(accounts.clone());

        let signers = resolver
            .resolve_signers(accounts.resolve("src").unwrap(), Some("chan"), &["extra".to_string()])
            .unwrap();

        assert_eq!(names(&signers), vec!["src", "chan"]);
        let chan = accounts.get("chan").unwrap().unwrap();
        assert_eq!(signers.fee_source_address(), chan.address);
    }

    #[test]
    fn test_channel_same_as_source() {
        let accounts = setup(&["src"]);
        let resolver = SignerResolver::new(accounts.clone());

        let signers = resolver
            .resolve_signers(accounts.resolve("src").unwrap(), Some("src"), &[])
            .unwrap();
        assert_eq!(names(&signers), vec!["src"]);
    }

    #[test]
    fn test_missing_accounts() {
        let accounts = setup(&["src"]);
        let resolver = SignerResolver::new(accounts.clone());

        let err = resolver
            .resolve_signers(accounts.resolve("src").unwrap(), Some("nochan"), &[])
            .unwrap_err();
        assert!(matches!(err, CustodyError::AccountNotFound(name) if name == "nochan"));

        let err = resolver
            .resolve_signers(accounts.resolve("src").unwrap(), None, &["nobody".to_string()])
            .unwrap_err();
        assert!(matches!(err, CustodyError::AccountNotFound(name) if name == "nobody"));
    }
}
