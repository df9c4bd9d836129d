//! Request handling
//!
//! Routes validated requests to issuance, account reads, payment assembly and
//! submission, and renders their JSON responses.

use crate::api::protocol::{RawRequest, Response};
use crate::api::request::Request;
use crate::errors::{CustodyError, ErrorClass, Result};
use crate::issuance::AccountIssuer;
use crate::ledger::{Faucet, LedgerClient, Network};
use crate::signer::PaymentAssembler;
use crate::store::{Account, AccountStore, KeyValueStore};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct Backend {
    accounts: AccountStore,
    issuer: AccountIssuer,
    assembler: PaymentAssembler,
    ledger: Arc<dyn LedgerClient>,
}

impl Backend {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ledger: Arc<dyn LedgerClient>,
        faucet: Option<Arc<dyn Faucet>>,
        network: Network,
        base_fee: u32,
    ) -> Self {
        let accounts = AccountStore::new(store);
        Self {
            issuer: AccountIssuer::new(accounts.clone(), faucet),
            assembler: PaymentAssembler::new(accounts.clone(), ledger.clone(), network, base_fee),
            accounts,
            ledger,
        }
    }

    /// Parse, execute and render one protocol line
    pub fn process_line(&self, line: &str) -> Response {
        let raw: RawRequest = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => return Response::parse_error(&e.to_string()),
        };

        match Request::from_raw(&raw).and_then(|request| {
            debug!("Handling {} request", request.kind());
            self.handle(&request)
        }) {
            Ok(data) => Response::ok(data),
            Err(e) => {
                match e.class() {
                    ErrorClass::Dependency => {
                        error!("{} {} failed: {}", raw.operation, raw.path, e)
                    }
                    _ => info!("{} {} rejected: {}", raw.operation, raw.path, e),
                }
                Response::error(&e)
            }
        }
    }

    pub fn handle(&self, request: &Request) -> Result<Value> {
        match request {
            Request::ReadAccount { name } => {
                let account = self
                    .accounts
                    .get(name)?
                    .ok_or_else(|| CustodyError::AccountNotFound(name.clone()))?;
                Ok(account_json(&account))
            }
            Request::CreateAccount { name, params } => {
                let account = self.issuer.create_account(name, params)?;
                let mut body = account_json(&account);
                if let (Value::Object(map), Some(created_at)) = (&mut body, account.created_at) {
                    map.insert("createdAt".to_string(), json!(created_at.to_rfc3339()));
                }
                Ok(body)
            }
            Request::ListAccounts => Ok(json!({ "keys": self.accounts.list()? })),
            Request::CreatePayment(payment) => {
                let signed = self.assembler.build_signed_transfer(payment)?;
                serde_json::to_value(signed)
                    .map_err(|e| CustodyError::EncodingFailure(e.to_string()))
            }
            Request::SubmitTransaction { envelope } => {
                if BASE64.decode(envelope).is_err() {
                    return Err(CustodyError::InvalidRequest(
                        "signed_transaction is not valid base64".to_string(),
                    ));
                }
                let result = self.ledger.submit(envelope)?;
                serde_json::to_value(result)
                    .map_err(|e| CustodyError::EncodingFailure(e.to_string()))
            }
        }
    }
}

fn account_json(account: &Account) -> Value {
    json!({
        "address": account.address,
        "stellarAccountId": account.account_id,
        "txSpendLimit": account.policy.tx_spend_limit.to_string(),
        "whitelist": account.policy.whitelist,
        "blacklist": account.policy.blacklist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fake::{FakeFaucet, FakeLedger};
    use crate::store::MemoryStore;

    fn backend() -> (Arc<FakeLedger>, Backend) {
        let ledger = Arc::new(FakeLedger::default());
        let backend = Backend::new(
            Arc::new(MemoryStore::new()),
            ledger.clone(),
            Some(Arc::new(FakeFaucet::default()) as Arc<dyn Faucet>),
            Network::Testnet,
            100,
        );
        (ledger, backend)
    }

    fn call(backend: &Backend, request: Value) -> Response {
        backend.process_line(&request.to_string())
    }

    fn data(response: Response) -> Value {
        assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
        response.data.unwrap()
    }

    fn error_code(response: Response) -> String {
        response.error.expect("expected an error").code
    }

    #[test]
    fn test_create_read_list() {
        let (_, backend) = backend();

        let created = data(call(
            &backend,
            json!({"operation": "create", "path": "accounts/acc1", "data": {"tx_spend_limit": "100"}}),
        ));
        assert_eq!(created["txSpendLimit"], "100");
        assert!(created["createdAt"].is_string());
        assert!(created.get("seed").is_none());

        let read = data(call(&backend, json!({"operation": "read", "path": "accounts/acc1"})));
        assert_eq!(read["address"], created["address"]);
        assert_eq!(read["stellarAccountId"], created["address"]);
        assert!(read.get("seed").is_none());

        let list = data(call(&backend, json!({"operation": "list", "path": "accounts/"})));
        assert_eq!(list, json!({"keys": ["acc1"]}));
    }

    #[test]
    fn test_payment_flow() {
        let (_, backend) = backend();
        for name in ["acc1", "acc2"] {
            data(call(
                &backend,
                json!({"operation": "create", "path": format!("accounts/{}", name), "data": {"tx_spend_limit": "100"}}),
            ));
        }

        let signed = data(call(
            &backend,
            json!({"operation": "create", "path": "payments", "data": {
                "source": "acc1", "destination": "acc2", "amount": "50", "assetCode": "native"
            }}),
        ));
        assert_eq!(signed["fee"], 100);
        assert_eq!(signed["account_sequence"], 1);
        assert_eq!(signed["signers"].as_array().unwrap().len(), 1);

        let rejected = call(
            &backend,
            json!({"operation": "create", "path": "payments", "data": {
                "source": "acc1", "destination": "acc2", "amount": "150", "assetCode": "native"
            }}),
        );
        let err = rejected.error.unwrap();
        assert_eq!(err.class, "policy");
        assert_eq!(err.code, "spend_limit_exceeded");
        assert_eq!(
            err.message,
            "Policy violation: transaction amount (150) is larger than the transactional limit (100)"
        );
    }

    #[test]
    fn test_unknown_field_before_lookup() {
        let (_, backend) = backend();
        let response = call(
            &backend,
            json!({"operation": "create", "path": "payments", "data": {
                "source": "nobody", "destination": "ghost", "amount": "1",
                "assetCode": "native", "foo": "bar"
            }}),
        );
        assert_eq!(error_code(response), "unknown_field");
    }

    #[test]
    fn test_missing_accounts() {
        let (_, backend) = backend();
        data(call(&backend, json!({"operation": "create", "path": "accounts/src"})));

        let response = call(
            &backend,
            json!({"operation": "create", "path": "payments", "data": {
                "source": "src", "destination": "ghost", "amount": "1", "assetCode": "native"
            }}),
        );
        let err = response.error.unwrap();
        assert_eq!(err.class, "not_found");
        assert_eq!(err.message, "Account not found: ghost");

        let response = call(&backend, json!({"operation": "read", "path": "accounts/ghost"}));
        assert_eq!(error_code(response), "account_not_found");
    }

    #[test]
    fn test_submit() {
        let (ledger, backend) = backend();
        let result = data(call(
            &backend,
            json!({"operation": "create", "path": "transactions", "data": {"signed_transaction": "AAAAAg=="}}),
        ));
        assert_eq!(result["ledger"], 1001);
        assert_eq!(ledger.submitted.lock().unwrap().len(), 1);

        let response = call(
            &backend,
            json!({"operation": "create", "path": "transactions", "data": {"signed_transaction": "%%%"}}),
        );
        assert_eq!(error_code(response), "invalid_request");
    }

    #[test]
    fn test_malformed_lines() {
        let (_, backend) = backend();
        assert_eq!(error_code(backend.process_line("not json")), "parse_error");
        assert_eq!(
            error_code(call(&backend, json!({"operation": "delete", "path": "accounts/a"}))),
            "unsupported_operation"
        );
    }
}
