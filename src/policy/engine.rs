//! Policy validator
//!
//! Evaluates a proposed transfer against the source account's policy. Rules run
//! in a fixed order and the first failing rule is reported.

use crate::policy::rules::*;
use num_bigint::BigUint;
use tracing::debug;

/// Transfer policy attached to an account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPolicy {
    /// Maximum amount per transaction; zero = unlimited
    pub tx_spend_limit: BigUint,
    /// Addresses this account may pay; empty = any
    pub whitelist: Vec<String>,
    /// Addresses this account may never pay
    pub blacklist: Vec<String>,
}

impl AccountPolicy {
    /// The account's rules, in evaluation order
    pub fn rules(&self) -> [PolicyRule; 3] {
        [
            PolicyRule::SpendLimit(SpendLimitRule::new(self.tx_spend_limit.clone())),
            PolicyRule::AddressDenylist(AddressListRule::new(self.blacklist.iter().cloned())),
            PolicyRule::AddressAllowlist(AddressListRule::new(self.whitelist.iter().cloned())),
        ]
    }
}

/// Validate a transfer of `amount` to `destination` against `policy`
pub fn validate(
    policy: &AccountPolicy,
    amount: &BigUint,
    destination: &str,
) -> Result<(), PolicyViolation> {
    let ctx = TransferContext { amount, destination };

    for rule in policy.rules() {
        if let Err(violation) = rule.check(&ctx) {
            debug!(
                "Policy rejected transfer to {}: {} ({})",
                destination,
                violation,
                rule.description()
            );
            return Err(violation);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: &str = "GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H";
    const Y: &str = "GAEDTJ4PPEFVW5XV2S7LUXBEHNQMX5Q2GM562RJGOQG7GVCE5H3HIB4V";

    fn policy(limit: u32, whitelist: &[&str], blacklist: &[&str]) -> AccountPolicy {
        AccountPolicy {
            tx_spend_limit: BigUint::from(limit),
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_unrestricted_policy_allows() {
        let p = policy(0, &[], &[]);
        assert!(validate(&p, &BigUint::from(u64::MAX), X).is_ok());
    }

    #[test]
    fn test_limit_boundary() {
        let p = policy(100, &[], &[]);
        assert!(validate(&p, &BigUint::from(100u32), X).is_ok());
        assert!(matches!(
            validate(&p, &BigUint::from(101u32), X),
            Err(PolicyViolation::SpendLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_blacklist_wins_over_whitelist() {
        let p = policy(0, &[X], &[X]);
        assert_eq!(
            validate(&p, &BigUint::from(1u32), X),
            Err(PolicyViolation::Blacklisted { address: X.into() })
        );
    }

    #[test]
    fn test_whitelist_rejects_unlisted() {
        let p = policy(0, &[Y], &[]);
        assert_eq!(
            validate(&p, &BigUint::from(1u32), X),
            Err(PolicyViolation::NotWhitelisted { address: X.into() })
        );
        assert!(validate(&p, &BigUint::from(1u32), Y).is_ok());
    }

    #[test]
    fn test_spend_limit_checked_first() {
        // Every rule fails; the spend limit is reported
        let p = policy(10, &[Y], &[X]);
        assert!(matches!(
            validate(&p, &BigUint::from(11u32), X),
            Err(PolicyViolation::SpendLimitExceeded { .. })
        ));
    }
}
