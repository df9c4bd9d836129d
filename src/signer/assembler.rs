//! Payment assembly and signing
//!
//! Turns a validated payment request into a signed envelope: resolve the
//! accounts, check the source's policy, build one payment operation, anchor
//! it on the fee source and sign with the resolved keys.

use crate::crypto::{parse_address, StellarKeyPair};
use crate::errors::{CustodyError, Result};
use crate::ledger::{LedgerClient, Network};
use crate::policy;
use crate::signer::resolver::SignerResolver;
use crate::store::AccountStore;
use crate::tx::{
    build_transaction, parse_asset, payment_op, sign_transaction, text_memo, to_stroops,
};
use num_bigint::BigUint;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A transfer request that has passed shape validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub source: String,
    pub destination: String,
    pub payment_channel: Option<String>,
    pub additional_signers: Vec<String>,
    /// Whole units of the asset
    pub amount: BigUint,
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub memo: Option<String>,
}

/// Output of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransaction {
    pub source_address: String,
    pub account_sequence: i64,
    pub fee: u32,
    pub transaction_hash: String,
    pub signed_transaction: String,
    /// Addresses whose signatures are attached, in order
    pub signers: Vec<String>,
}

pub struct PaymentAssembler {
    accounts: AccountStore,
    resolver: SignerResolver,
    ledger: Arc<dyn LedgerClient>,
    network: Network,
    base_fee: u32,
}

impl PaymentAssembler {
    pub fn new(
        accounts: AccountStore,
        ledger: Arc<dyn LedgerClient>,
        network: Network,
        base_fee: u32,
    ) -> Self {
        Self {
            resolver: SignerResolver::new(accounts.clone()),
            accounts,
            ledger,
            network,
            base_fee,
        }
    }

    /// Authorize and sign a transfer. Performs no writes.
    pub fn build_signed_transfer(&self, request: &PaymentRequest) -> Result<SignedTransaction> {
        let source = self.accounts.resolve(&request.source)?;
        let destination = self
            .accounts
            .get(&request.destination)?
            .ok_or_else(|| CustodyError::AccountNotFound(request.destination.clone()))?;

        let signers = self.resolver.resolve_signers(
            source,
            request.payment_channel.as_deref(),
            &request.additional_signers,
        )?;

        policy::validate(
            &signers.source().account.policy,
            &request.amount,
            &destination.address,
        )?;

        let asset = parse_asset(&request.asset_code, request.asset_issuer.as_deref())?;
        let memo = text_memo(request.memo.as_deref().unwrap_or_default())?;
        let amount = to_stroops(&request.amount)?;

        let source_key = parse_address(signers.source().address())
            .map_err(|e| CustodyError::StorageFailure(format!("Stored address is corrupt: {}", e)))?;
        let destination_key = parse_address(&destination.address)
            .map_err(|e| CustodyError::StorageFailure(format!("Stored address is corrupt: {}", e)))?;
        let fee_source = signers.fee_source_address().to_string();
        let fee_source_key = parse_address(&fee_source)
            .map_err(|e| CustodyError::StorageFailure(format!("Stored address is corrupt: {}", e)))?;

        let operations = vec![payment_op(Some(source_key), destination_key, asset, amount)];
        let fee = self
            .base_fee
            .checked_mul(operations.len() as u32)
            .ok_or_else(|| CustodyError::InternalError("Fee overflow".to_string()))?;

        let sequence = self
            .ledger
            .sequence_for(&fee_source)?
            .checked_add(1)
            .ok_or_else(|| CustodyError::LedgerFailure("Sequence number overflow".to_string()))?;
        debug!("Using sequence {} for fee source {}", sequence, fee_source);

        let tx = build_transaction(fee_source_key, fee, sequence, memo, operations)?;

        // Keys live only until the envelope is signed
        let keys = signers
            .signers()
            .iter()
            .map(|s| s.keypair())
            .collect::<Result<Vec<StellarKeyPair>>>()?;
        let signer_addresses = keys.iter().map(StellarKeyPair::address).collect::<Vec<_>>();
        let envelope = sign_transaction(tx, &self.network, &keys)?;
        drop(keys);

        let signed = SignedTransaction {
            source_address: fee_source,
            account_sequence: sequence,
            fee,
            transaction_hash: envelope.hash_hex(),
            signed_transaction: envelope.to_base64()?,
            signers: signer_addresses,
        };

        info!(
            "Signed transfer {} from {} to {} ({} signers)",
            signed.transaction_hash,
            request.source,
            request.destination,
            signed.signers.len()
        );
        Ok(signed)
    }
}
