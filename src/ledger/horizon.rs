//! Horizon and Friendbot HTTP clients
//!
//! Both are blocking clients: the engine is synchronous and every request is
//! already running on tokio's blocking pool.

use crate::errors::{CustodyError, Result};
use crate::ledger::{Faucet, LedgerClient, SubmitResult};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    ledger: u32,
}

/// Horizon "problem" body returned on failures
#[derive(Debug, Default, Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: Option<serde_json::Value>,
}

impl Problem {
    fn describe(&self, status: StatusCode) -> String {
        let title = if self.title.is_empty() {
            status.to_string()
        } else {
            self.title.clone()
        };
        match self.extras.as_ref().and_then(|e| e.result_codes.as_ref()) {
            Some(codes) => format!("{} {}", title, codes),
            None => title,
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CustodyError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

fn transport_error(e: reqwest::Error) -> CustodyError {
    CustodyError::LedgerFailure(e.to_string())
}

/// `LedgerClient` backed by a Horizon server
pub struct HorizonClient {
    client: Client,
    base_url: String,
}

impl HorizonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn problem(response: reqwest::blocking::Response) -> CustodyError {
        let status = response.status();
        let problem: Problem = response.json().unwrap_or_default();
        CustodyError::LedgerFailure(problem.describe(status))
    }
}

impl LedgerClient for HorizonClient {
    fn sequence_for(&self, address: &str) -> Result<i64> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        debug!("Fetching sequence from {}", url);

        let response = self.client.get(&url).send().map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CustodyError::LedgerFailure(format!(
                "Account {} does not exist on the ledger",
                address
            )));
        }
        if !response.status().is_success() {
            return Err(Self::problem(response));
        }

        let account: AccountResponse = response.json().map_err(transport_error)?;
        account.sequence.parse::<i64>().map_err(|_| {
            CustodyError::LedgerFailure(format!("Malformed sequence number '{}'", account.sequence))
        })
    }

    fn submit(&self, envelope_b64: &str) -> Result<SubmitResult> {
        let url = format!("{}/transactions", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("tx", envelope_b64)])
            .send()
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::problem(response));
        }

        let submitted: SubmitResponse = response.json().map_err(transport_error)?;
        info!(
            "Transaction {} included in ledger {}",
            submitted.hash, submitted.ledger
        );
        Ok(SubmitResult {
            hash: submitted.hash,
            ledger: submitted.ledger,
        })
    }
}

/// Testnet faucet
pub struct Friendbot {
    client: Client,
    url: String,
}

impl Friendbot {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.to_string(),
        })
    }
}

impl Faucet for Friendbot {
    fn fund(&self, address: &str, starting_balance: Option<&str>) -> Result<()> {
        // Friendbot always funds its fixed amount
        if let Some(balance) = starting_balance {
            debug!("Requested starting balance {} for {}", balance, address);
        }

        let response = self
            .client
            .get(&self.url)
            .query(&[("addr", address)])
            .send()
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(CustodyError::LedgerFailure(format!(
                "Friendbot returned {} for {}",
                response.status(),
                address
            )));
        }

        info!("Funded account {}", address);
        Ok(())
    }
}
