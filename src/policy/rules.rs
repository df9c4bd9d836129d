//! Transfer policy rules
//!
//! Each account carries three rules, always evaluated in this order:
//! - Per-transaction spend limit
//! - Destination denylist (blacklist)
//! - Destination allowlist (whitelist)

use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::HashSet;
use thiserror::Error;

/// The specific rule a transfer broke, with the values involved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("transaction amount ({amount}) is larger than the transactional limit ({limit})")]
    SpendLimitExceeded { limit: BigUint, amount: BigUint },

    #[error("{address} is blacklisted")]
    Blacklisted { address: String },

    #[error("{address} is not in the whitelist")]
    NotWhitelisted { address: String },
}

impl PolicyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyViolation::SpendLimitExceeded { .. } => "spend_limit_exceeded",
            PolicyViolation::Blacklisted { .. } => "blacklisted",
            PolicyViolation::NotWhitelisted { .. } => "not_whitelisted",
        }
    }
}

/// A proposed outbound transfer, as seen by the rules
#[derive(Debug, Clone, Copy)]
pub struct TransferContext<'a> {
    pub amount: &'a BigUint,
    pub destination: &'a str,
}

/// A rule that can reject a transfer
#[derive(Debug, Clone)]
pub enum PolicyRule {
    /// Cap the amount moved by a single transaction
    SpendLimit(SpendLimitRule),

    /// Never pay these addresses
    AddressDenylist(AddressListRule),

    /// Only pay these addresses
    AddressAllowlist(AddressListRule),
}

impl PolicyRule {
    /// Check a transfer against this rule
    pub fn check(&self, ctx: &TransferContext<'_>) -> Result<(), PolicyViolation> {
        match self {
            PolicyRule::SpendLimit(r) => r.check(ctx.amount),
            PolicyRule::AddressDenylist(r) => {
                if r.contains(ctx.destination) {
                    return Err(PolicyViolation::Blacklisted {
                        address: ctx.destination.to_string(),
                    });
                }
                Ok(())
            }
            PolicyRule::AddressAllowlist(r) => {
                if !r.is_empty() && !r.contains(ctx.destination) {
                    return Err(PolicyViolation::NotWhitelisted {
                        address: ctx.destination.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Get a human-readable description of the rule
    pub fn description(&self) -> String {
        match self {
            PolicyRule::SpendLimit(r) if r.is_unlimited() => "No spend limit".to_string(),
            PolicyRule::SpendLimit(r) => format!("Max {} per transaction", r.limit),
            PolicyRule::AddressDenylist(r) => format!("Deny {} addresses", r.len()),
            PolicyRule::AddressAllowlist(r) if r.is_empty() => "Allow any address".to_string(),
            PolicyRule::AddressAllowlist(r) => format!("Allow only {} addresses", r.len()),
        }
    }
}

/// Per-transaction spend limit; zero means unlimited
#[derive(Debug, Clone)]
pub struct SpendLimitRule {
    pub limit: BigUint,
}

impl SpendLimitRule {
    pub fn new(limit: BigUint) -> Self {
        Self { limit }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit.is_zero()
    }

    pub fn check(&self, amount: &BigUint) -> Result<(), PolicyViolation> {
        if !self.is_unlimited() && *amount > self.limit {
            return Err(PolicyViolation::SpendLimitExceeded {
                limit: self.limit.clone(),
                amount: amount.clone(),
            });
        }
        Ok(())
    }
}

/// A set of destination addresses, compared exactly
#[derive(Debug, Clone, Default)]
pub struct AddressListRule {
    pub addresses: HashSet<String>,
}

impl AddressListRule {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.addresses.contains(addr)
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }
}
