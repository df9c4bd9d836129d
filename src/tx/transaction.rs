//! Payment transactions
//!
//! Validated request parts are turned into `stellar_xdr` payment operations.
//! A transaction is hashed for a network and signed into a
//! `TransactionV1Envelope`.

use crate::crypto::{parse_address, StellarKeyPair};
use crate::errors::{CustodyError, Result};
use crate::ledger::Network;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, AlphaNum12, AlphaNum4, Asset, AssetCode12, AssetCode4, BytesM, DecoratedSignature,
    Hash, Limits, Memo, MuxedAccount, Operation, OperationBody, PaymentOp, Preconditions,
    PublicKey, SequenceNumber, Signature, SignatureHint, StringM, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, WriteXdr,
};

/// Stroops per whole unit of an asset
pub const STROOPS_PER_UNIT: u64 = 10_000_000;

/// Maximum text memo length in bytes
pub const MAX_MEMO_TEXT_LEN: usize = 28;

/// Convert whole units into stroops, rejecting anything outside `i64`
pub fn to_stroops(amount: &BigUint) -> Result<i64> {
    (amount * STROOPS_PER_UNIT)
        .to_i64()
        .ok_or_else(|| CustodyError::InvalidAmount(format!("{} is too large for the ledger", amount)))
}

/// Build an asset from a code and, for credit assets, an issuer address.
///
/// `native` matches case-insensitively. Codes of 1 to 4 characters become
/// `CreditAlphanum4`, 5 to 12 become `CreditAlphanum12`.
pub fn parse_asset(code: &str, issuer: Option<&str>) -> Result<Asset> {
    if code.eq_ignore_ascii_case("native") {
        return Ok(Asset::Native);
    }

    if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CustodyError::InvalidAssetCode(format!(
            "'{}' must be 1 to 12 alphanumeric characters",
            code
        )));
    }

    let issuer = issuer.ok_or_else(|| CustodyError::MissingField("assetIssuer".to_string()))?;
    let issuer = parse_address(issuer)
        .map_err(|_| CustodyError::InvalidIssuerAddress(issuer.to_string()))?;
    let issuer = account_id(issuer);

    if code.len() <= 4 {
        let mut padded = [0u8; 4];
        padded[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum4(AlphaNum4 {
            asset_code: AssetCode4(padded),
            issuer,
        }))
    } else {
        let mut padded = [0u8; 12];
        padded[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum12(AlphaNum12 {
            asset_code: AssetCode12(padded),
            issuer,
        }))
    }
}

/// Empty text means no memo
pub fn text_memo(text: &str) -> Result<Memo> {
    if text.is_empty() {
        return Ok(Memo::None);
    }
    if text.len() > MAX_MEMO_TEXT_LEN {
        return Err(CustodyError::InvalidMemo(format!(
            "text memo is {} bytes, at most {} allowed",
            text.len(),
            MAX_MEMO_TEXT_LEN
        )));
    }
    let text = StringM::<28>::try_from(text.as_bytes().to_vec())
        .map_err(|e| CustodyError::InvalidMemo(e.to_string()))?;
    Ok(Memo::Text(text))
}

/// A payment operation; a `None` source falls back to the transaction source
pub fn payment_op(
    source: Option<[u8; 32]>,
    destination: [u8; 32],
    asset: Asset,
    amount: i64,
) -> Operation {
    Operation {
        source_account: source.map(muxed_account),
        body: OperationBody::Payment(PaymentOp {
            destination: muxed_account(destination),
            asset,
            amount,
        }),
    }
}

/// Unsigned transaction with no preconditions
pub fn build_transaction(
    source: [u8; 32],
    fee: u32,
    sequence: i64,
    memo: Memo,
    operations: Vec<Operation>,
) -> Result<Transaction> {
    Ok(Transaction {
        source_account: muxed_account(source),
        fee,
        seq_num: SequenceNumber(sequence),
        cond: Preconditions::None,
        memo,
        operations: operations.try_into()?,
        ext: TransactionExt::V0,
    })
}

/// Hash signed by every signer: network id, envelope type, transaction
pub fn transaction_hash(tx: &Transaction, network: &Network) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(network.network_id()),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none())?;
    Ok(Sha256::digest(bytes).into())
}

/// Sign the hash with each key, in order
pub fn sign_transaction(
    tx: Transaction,
    network: &Network,
    signers: &[StellarKeyPair],
) -> Result<SignedEnvelope> {
    if signers.is_empty() {
        return Err(CustodyError::SigningFailure("No signers supplied".to_string()));
    }

    let hash = transaction_hash(&tx, network)?;
    let signatures = signers
        .iter()
        .map(|key| -> Result<DecoratedSignature> {
            let signature = BytesM::<64>::try_from(key.sign(&hash).to_vec())?;
            Ok(DecoratedSignature {
                hint: SignatureHint(key.signature_hint()),
                signature: Signature(signature),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SignedEnvelope {
        envelope: TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: signatures.try_into()?,
        }),
        hash,
    })
}

/// A signed envelope and the hash its signatures cover
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub envelope: TransactionEnvelope,
    pub hash: [u8; 32],
}

impl SignedEnvelope {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(self.envelope.to_xdr_base64(Limits::none())?)
    }
}

fn muxed_account(key: [u8; 32]) -> MuxedAccount {
    MuxedAccount::Ed25519(Uint256(key))
}

fn account_id(key: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))
}
