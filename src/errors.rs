//! Error types for stellar-custody

use crate::policy::PolicyViolation;
use serde::Serialize;
use thiserror::Error;

/// Main error type for custody operations
#[derive(Error, Debug)]
pub enum CustodyError {
    // Request shape errors
    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("unknown fields: {0:?}")]
    UnknownField(Vec<String>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("tx_spend_limit is either not a number or is negative: {0}")]
    InvalidSpendLimit(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid address for assetIssuer: {0}")]
    InvalidIssuerAddress(String),

    #[error("Invalid asset code: {0}")]
    InvalidAssetCode(String),

    #[error("Invalid memo: {0}")]
    InvalidMemo(String),

    // Policy errors
    #[error("Policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    // Lookup errors
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // Dependency errors
    #[error("Storage error: {0}")]
    StorageFailure(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    #[error("Ledger error: {0}")]
    LedgerFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Caller-facing error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    User,
    Policy,
    NotFound,
    Dependency,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::User => "user",
            ErrorClass::Policy => "policy",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Dependency => "dependency",
        }
    }
}

impl CustodyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CustodyError::MissingField(_)
            | CustodyError::UnknownField(_)
            | CustodyError::InvalidRequest(_)
            | CustodyError::UnsupportedOperation(_)
            | CustodyError::InvalidAmount(_)
            | CustodyError::InvalidSpendLimit(_)
            | CustodyError::InvalidAddress(_)
            | CustodyError::InvalidIssuerAddress(_)
            | CustodyError::InvalidAssetCode(_)
            | CustodyError::InvalidMemo(_) => ErrorClass::User,
            CustodyError::PolicyViolation(_) => ErrorClass::Policy,
            CustodyError::AccountNotFound(_) => ErrorClass::NotFound,
            CustodyError::StorageFailure(_)
            | CustodyError::SigningFailure(_)
            | CustodyError::EncodingFailure(_)
            | CustodyError::LedgerFailure(_)
            | CustodyError::ConfigError(_)
            | CustodyError::InternalError(_) => ErrorClass::Dependency,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CustodyError::MissingField(_) => "missing_field",
            CustodyError::UnknownField(_) => "unknown_field",
            CustodyError::InvalidRequest(_) => "invalid_request",
            CustodyError::UnsupportedOperation(_) => "unsupported_operation",
            CustodyError::InvalidAmount(_) => "invalid_amount",
            CustodyError::InvalidSpendLimit(_) => "invalid_spend_limit",
            CustodyError::InvalidAddress(_) => "invalid_address",
            CustodyError::InvalidIssuerAddress(_) => "invalid_issuer_address",
            CustodyError::InvalidAssetCode(_) => "invalid_asset_code",
            CustodyError::InvalidMemo(_) => "invalid_memo",
            CustodyError::PolicyViolation(v) => v.code(),
            CustodyError::AccountNotFound(_) => "account_not_found",
            CustodyError::StorageFailure(_) => "storage_failure",
            CustodyError::SigningFailure(_) => "signing_failure",
            CustodyError::EncodingFailure(_) => "encoding_failure",
            CustodyError::LedgerFailure(_) => "ledger_failure",
            CustodyError::ConfigError(_) => "config_error",
            CustodyError::InternalError(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for CustodyError {
    fn from(err: std::io::Error) -> Self {
        CustodyError::StorageFailure(err.to_string())
    }
}

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        CustodyError::StorageFailure(format!("JSON error: {}", err))
    }
}

impl From<base64::DecodeError> for CustodyError {
    fn from(err: base64::DecodeError) -> Self {
        CustodyError::EncodingFailure(format!("Base64 decode error: {}", err))
    }
}

impl From<stellar_xdr::curr::Error> for CustodyError {
    fn from(err: stellar_xdr::curr::Error) -> Self {
        CustodyError::EncodingFailure(format!("XDR error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, CustodyError>;
