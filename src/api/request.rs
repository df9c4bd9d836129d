//! Request parsing
//!
//! Every `(operation, path)` pair the engine serves has one validating
//! constructor here. Constructors reject unknown fields before anything else
//! and never touch the store.

use crate::api::protocol::RawRequest;
use crate::errors::{CustodyError, Result};
use crate::issuance::NewAccount;
use crate::signer::PaymentRequest;
use num_bigint::BigUint;
use serde_json::{Map, Value};
use std::str::FromStr;

const ACCOUNT_FIELDS: &[&str] = &[
    "name",
    "xlm_balance",
    "source_account_name",
    "tx_spend_limit",
    "whitelist",
    "blacklist",
];

const PAYMENT_FIELDS: &[&str] = &[
    "source",
    "destination",
    "paymentChannel",
    "additionalSigners",
    "amount",
    "assetCode",
    "assetIssuer",
    "memo",
];

const TRANSACTION_FIELDS: &[&str] = &["signed_transaction"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    List,
}

impl FromStr for Operation {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Operation::Read),
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "list" => Ok(Operation::List),
            other => Err(CustodyError::UnsupportedOperation(other.to_string())),
        }
    }
}

/// A validated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadAccount { name: String },
    CreateAccount { name: String, params: NewAccount },
    ListAccounts,
    CreatePayment(PaymentRequest),
    SubmitTransaction { envelope: String },
}

impl Request {
    pub fn from_raw(raw: &RawRequest) -> Result<Self> {
        Self::parse(&raw.operation, &raw.path, &raw.data)
    }

    /// Dispatch on operation and path
    pub fn parse(operation: &str, path: &str, data: &Map<String, Value>) -> Result<Self> {
        let op = operation.parse::<Operation>()?;
        let path = path.trim_matches('/');

        match (op, path) {
            (Operation::List, "accounts") => Self::list_accounts(data),
            (Operation::Create | Operation::Update, "payments") => Self::create_payment(data),
            (Operation::Create | Operation::Update, "transactions") => {
                Self::submit_transaction(data)
            }
            (op, path) => match path.strip_prefix("accounts/") {
                Some(name) if op == Operation::Read => Self::read_account(name, data),
                Some(name) if matches!(op, Operation::Create | Operation::Update) => {
                    Self::create_account(name, data)
                }
                _ => Err(CustodyError::UnsupportedOperation(format!(
                    "{} on '{}'",
                    operation, path
                ))),
            },
        }
    }

    pub fn read_account(name: &str, data: &Map<String, Value>) -> Result<Self> {
        Fields::new(data).check_known(&["name"])?;
        Ok(Request::ReadAccount {
            name: account_name(name)?,
        })
    }

    pub fn create_account(name: &str, data: &Map<String, Value>) -> Result<Self> {
        let fields = Fields::new(data);
        fields.check_known(ACCOUNT_FIELDS)?;
        let name = account_name(name)?;

        let params = NewAccount {
            xlm_balance: fields.string("xlm_balance")?,
            tx_spend_limit: fields
                .string("tx_spend_limit")?
                .unwrap_or_else(|| "0".to_string()),
            whitelist: fields.list("whitelist")?,
            blacklist: fields.list("blacklist")?,
        };
        Ok(Request::CreateAccount { name, params })
    }

    pub fn list_accounts(data: &Map<String, Value>) -> Result<Self> {
        Fields::new(data).check_known(&[])?;
        Ok(Request::ListAccounts)
    }

    pub fn create_payment(data: &Map<String, Value>) -> Result<Self> {
        let fields = Fields::new(data);
        fields.check_known(PAYMENT_FIELDS)?;

        let source = fields.required("source")?;
        let destination = fields.required("destination")?;
        let amount = fields.required("amount")?;
        let asset_code = fields.required("assetCode")?;

        let asset_issuer = fields.string("assetIssuer")?.filter(|s| !s.is_empty());
        if asset_issuer.is_none() && !asset_code.eq_ignore_ascii_case("native") {
            return Err(CustodyError::MissingField("assetIssuer".to_string()));
        }

        let payment_channel = fields.string("paymentChannel")?.filter(|s| !s.is_empty());
        let additional_signers = fields.list("additionalSigners")?;
        let memo = fields.string("memo")?.filter(|s| !s.is_empty());

        Ok(Request::CreatePayment(PaymentRequest {
            source,
            destination,
            payment_channel,
            additional_signers,
            amount: parse_amount(&amount)?,
            asset_code,
            asset_issuer,
            memo,
        }))
    }

    pub fn submit_transaction(data: &Map<String, Value>) -> Result<Self> {
        let fields = Fields::new(data);
        fields.check_known(TRANSACTION_FIELDS)?;
        Ok(Request::SubmitTransaction {
            envelope: fields.required("signed_transaction")?,
        })
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ReadAccount { .. } => "read_account",
            Request::CreateAccount { .. } => "create_account",
            Request::ListAccounts => "list_accounts",
            Request::CreatePayment(_) => "create_payment",
            Request::SubmitTransaction { .. } => "submit_transaction",
        }
    }
}

/// Typed access to a request's data map
struct Fields<'a> {
    data: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(data: &'a Map<String, Value>) -> Self {
        Self { data }
    }

    fn check_known(&self, known: &[&str]) -> Result<()> {
        let mut unknown: Vec<String> = self
            .data
            .keys()
            .filter(|k| !known.contains(&k.as_str()))
            .cloned()
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        unknown.sort();
        Err(CustodyError::UnknownField(unknown))
    }

    /// Strings as-is, numbers and booleans in their JSON form, null as absent.
    /// Numbers keep their literal digits, so integers beyond `u64` survive.
    fn string(&self, key: &str) -> Result<Option<String>> {
        match self.data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(_) => Err(CustodyError::InvalidRequest(format!(
                "field '{}' must be a string",
                key
            ))),
        }
    }

    fn required(&self, key: &str) -> Result<String> {
        match self.string(key)? {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(CustodyError::MissingField(key.to_string())),
        }
    }

    /// A comma-separated string or an array of strings
    fn list(&self, key: &str) -> Result<Vec<String>> {
        let items: Vec<String> = match self.data.get(key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(CustodyError::InvalidRequest(format!(
                        "field '{}' must contain strings",
                        key
                    ))),
                })
                .collect::<Result<_>>()?,
            Some(_) => {
                return Err(CustodyError::InvalidRequest(format!(
                    "field '{}' must be a list",
                    key
                )))
            }
        };

        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Non-negative integer amount
fn parse_amount(raw: &str) -> Result<BigUint> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CustodyError::InvalidAmount(raw.to_string()));
    }
    BigUint::from_str(trimmed).map_err(|_| CustodyError::InvalidAmount(raw.to_string()))
}

/// Word characters, dashes and dots; must start and end with a word character
fn account_name(name: &str) -> Result<String> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let valid = name.chars().next().is_some_and(is_word)
        && name.chars().last().is_some_and(is_word)
        && name.chars().all(|c| is_word(c) || c == '-' || c == '.');

    if valid {
        Ok(name.to_string())
    } else {
        Err(CustodyError::InvalidRequest(format!(
            "invalid account name '{}'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_dispatch() {
        let empty = Map::new();
        assert_eq!(
            Request::parse("read", "accounts/acc1", &empty).unwrap(),
            Request::ReadAccount {
                name: "acc1".to_string()
            }
        );
        assert_eq!(
            Request::parse("list", "accounts/", &empty).unwrap(),
            Request::ListAccounts
        );
        assert!(matches!(
            Request::parse("update", "accounts/acc1", &empty).unwrap(),
            Request::CreateAccount { .. }
        ));
        assert!(matches!(
            Request::parse("delete", "accounts/acc1", &empty),
            Err(CustodyError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            Request::parse("read", "payments", &empty),
            Err(CustodyError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_create_account_defaults() {
        let request = Request::parse("create", "accounts/acc1", &Map::new()).unwrap();
        let Request::CreateAccount { name, params } = request else {
            panic!("expected CreateAccount");
        };
        assert_eq!(name, "acc1");
        assert_eq!(params.tx_spend_limit, "0");
        assert!(params.whitelist.is_empty());
        assert!(params.xlm_balance.is_none());
    }

    #[test]
    fn test_lists_from_string_or_array() {
        let request = Request::parse(
            "create",
            "accounts/acc1",
            &data(json!({"whitelist": "GA, GB,,", "blacklist": ["GC", " GD "]})),
        )
        .unwrap();
        let Request::CreateAccount { params, .. } = request else {
            panic!("expected CreateAccount");
        };
        assert_eq!(params.whitelist, vec!["GA", "GB"]);
        assert_eq!(params.blacklist, vec!["GC", "GD"]);
    }

    #[test]
    fn test_numeric_spend_limit() {
        let request = Request::parse(
            "create",
            "accounts/acc1",
            &data(json!({"tx_spend_limit": 100})),
        )
        .unwrap();
        let Request::CreateAccount { params, .. } = request else {
            panic!("expected CreateAccount");
        };
        assert_eq!(params.tx_spend_limit, "100");
    }

    #[test]
    fn test_invalid_account_names() {
        for name in ["", "-acc", "acc.", "a/b", "a b"] {
            assert!(
                Request::read_account(name, &Map::new()).is_err(),
                "{:?} should be rejected",
                name
            );
        }
        assert!(Request::read_account("my-acc.1", &Map::new()).is_ok());
    }

    #[test]
    fn test_payment() {
        let request = Request::parse(
            "create",
            "payments",
            &data(json!({
                "source": "acc1",
                "destination": "acc2",
                "amount": "50",
                "assetCode": "native",
                "additionalSigners": "x,y",
                "memo": "",
            })),
        )
        .unwrap();

        assert_eq!(
            request,
            Request::CreatePayment(PaymentRequest {
                source: "acc1".to_string(),
                destination: "acc2".to_string(),
                payment_channel: None,
                additional_signers: vec!["x".to_string(), "y".to_string()],
                amount: BigUint::from(50u32),
                asset_code: "native".to_string(),
                asset_issuer: None,
                memo: None,
            })
        );
    }

    #[test]
    fn test_payment_missing_fields() {
        let err = Request::create_payment(&data(json!({"destination": "b", "amount": "1", "assetCode": "native"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required field 'source'");

        let err = Request::create_payment(&data(json!({
            "source": "a", "destination": "b", "amount": "1", "assetCode": "USD"
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing required field 'assetIssuer'");

        let err = Request::create_payment(&data(json!({
            "source": "a", "destination": "b", "amount": "", "assetCode": "native"
        })))
        .unwrap_err();
        assert!(matches!(err, CustodyError::MissingField(f) if f == "amount"));
    }

    #[test]
    fn test_payment_invalid_amount() {
        for amount in ["-5", "abc", "1.5"] {
            let err = Request::create_payment(&data(json!({
                "source": "a", "destination": "b", "amount": amount, "assetCode": "native"
            })))
            .unwrap_err();
            assert!(matches!(err, CustodyError::InvalidAmount(_)), "{}", amount);
        }
    }

    #[test]
    fn test_shape_checked_before_amount() {
        let err = Request::create_payment(&data(json!({
            "source": "a", "destination": "b", "amount": "abc"
        })))
        .unwrap_err();
        assert!(matches!(err, CustodyError::MissingField(f) if f == "assetCode"));

        let err = Request::create_payment(&data(json!({
            "source": "a", "destination": "b", "amount": "abc", "assetCode": "USD"
        })))
        .unwrap_err();
        assert!(matches!(err, CustodyError::MissingField(f) if f == "assetIssuer"));
    }

    #[test]
    fn test_large_numeric_amounts() {
        let raw = r#"{"source": "a", "destination": "b", "amount": 1180591620717411303424, "assetCode": "native"}"#;
        let request = Request::create_payment(&serde_json::from_str(raw).unwrap()).unwrap();
        let Request::CreatePayment(payment) = request else {
            panic!("expected CreatePayment");
        };
        assert_eq!(payment.amount, BigUint::from(1u128 << 70));

        let raw = r#"{"tx_spend_limit": 18446744073709551616}"#;
        let request = Request::create_account("acc1", &serde_json::from_str(raw).unwrap()).unwrap();
        let Request::CreateAccount { params, .. } = request else {
            panic!("expected CreateAccount");
        };
        assert_eq!(params.tx_spend_limit, "18446744073709551616");
    }

    #[test]
    fn test_unknown_fields_sorted() {
        let err = Request::create_payment(&data(json!({
            "source": "a", "foo": "bar", "baz": 1
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            CustodyError::UnknownField(fields) if fields == vec!["baz", "foo"]
        ));
    }

    #[test]
    fn test_submit_transaction() {
        let request = Request::parse(
            "update",
            "transactions",
            &data(json!({"signed_transaction": "AAAA"})),
        )
        .unwrap();
        assert_eq!(
            request,
            Request::SubmitTransaction {
                envelope: "AAAA".to_string()
            }
        );
        assert!(matches!(
            Request::submit_transaction(&Map::new()),
            Err(CustodyError::MissingField(_))
        ));
    }
}
