//! Block-explorer client for the UTXO chain

use std::time::Duration;

use async_trait::async_trait;
use bitcoin::Amount;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BitcoinConfig;
use crate::error::{Error, Result};
use crate::transaction::types::{TransactionDetails, TransactionStatus, UnspentOutput};

/// Network access the Bitcoin pipeline needs
#[async_trait]
pub trait BitcoinClient: Send + Sync {
    /// All unspent outputs owned by `address`, in provider order
    async fn fetch_spendable_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>>;

    /// Full serialized bytes of a transaction
    async fn fetch_raw_transaction(&self, tx_id: &str) -> Result<Vec<u8>>;

    /// Push a signed transaction, returning the network-assigned id
    async fn broadcast(&self, signed_hex: &str) -> Result<String>;

    /// Look up a transaction for display
    async fn transaction_details(&self, tx_id: &str) -> Result<TransactionDetails> {
        Err(Error::NotSupported(format!("Transaction details for {}", tx_id)))
    }
}

/// Address query response
#[derive(Debug, Clone, Deserialize)]
struct AddressResponse {
    /// Absent when the address has no outputs
    #[serde(default)]
    txrefs: Vec<TxRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxRef {
    tx_hash: String,
    /// -1 for input references
    tx_output_n: i64,
    value: u64,
    #[serde(default)]
    spent: bool,
}

impl AddressResponse {
    fn into_unspent_outputs(self) -> Vec<UnspentOutput> {
        self.txrefs
            .into_iter()
            .filter(|txref| !txref.spent && txref.tx_output_n >= 0)
            .filter_map(|txref| {
                Some(UnspentOutput {
                    output_index: u32::try_from(txref.tx_output_n).ok()?,
                    source_tx_id: txref.tx_hash,
                    value_sats: txref.value,
                    spent: false,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawTransactionResponse {
    hex: String,
}

#[derive(Debug, Clone, Serialize)]
struct PushRequest<'a> {
    tx: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct PushResponse {
    tx: PushedTransaction,
}

#[derive(Debug, Clone, Deserialize)]
struct PushedTransaction {
    hash: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExplorerTransaction {
    hash: String,
    /// -1 while unconfirmed
    #[serde(default = "unconfirmed_height")]
    block_height: i64,
    #[serde(default)]
    fees: u64,
    #[serde(default)]
    confirmations: u64,
    #[serde(default)]
    inputs: Vec<ExplorerIo>,
    #[serde(default)]
    outputs: Vec<ExplorerIo>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExplorerIo {
    #[serde(default)]
    addresses: Option<Vec<String>>,
    #[serde(default)]
    value: Option<u64>,
}

fn unconfirmed_height() -> i64 {
    -1
}

impl ExplorerIo {
    fn first_address(&self) -> Option<String> {
        self.addresses.as_ref().and_then(|list| list.first().cloned())
    }
}

impl From<ExplorerTransaction> for TransactionDetails {
    fn from(tx: ExplorerTransaction) -> Self {
        let first_output = tx.outputs.first();
        let value_sats = first_output.and_then(|output| output.value).unwrap_or_default();

        TransactionDetails {
            hash: tx.hash,
            from: tx.inputs.first().and_then(ExplorerIo::first_address),
            to: first_output.and_then(ExplorerIo::first_address),
            value: Amount::from_sat(value_sats).to_btc().to_string(),
            fee: tx.fees.to_string(),
            block_number: u64::try_from(tx.block_height).ok(),
            confirmations: Some(tx.confirmations),
            status: if tx.confirmations > 0 {
                TransactionStatus::Confirmed
            } else {
                TransactionStatus::Pending
            },
        }
    }
}

// 404 is `NotFound`, any other non-2xx status is a transport failure.
fn check_query_status(url: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(Error::Network(format!("{} returned {}", url, status)));
    }
    Ok(())
}

// An unknown address is a transport-level failure for the unspent-output query.
fn address_lookup_error(error: Error) -> Error {
    match error {
        Error::NotFound(what) => Error::Network(format!("Address lookup failed: {}", what)),
        other => other,
    }
}

fn push_rejection(status: StatusCode, body: &str) -> Error {
    Error::BroadcastRejected(format!("{}: {}", status, body.trim()))
}

/// BlockCypher-style REST client
pub struct BlockcypherClient {
    config: BitcoinConfig,
    client: reqwest::Client,
}

impl BlockcypherClient {
    /// Create a new client
    pub fn new(config: BitcoinConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// GET a JSON document; 404 maps to `NotFound`
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to send request: {}", e)))?;

        check_query_status(url, response.status())?;

        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl BitcoinClient for BlockcypherClient {
    async fn fetch_spendable_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>> {
        let url = format!("{}{}?unspentOnly=true", self.config.address_endpoint, address);
        let response: AddressResponse = self.get_json(&url).await.map_err(address_lookup_error)?;

        let outputs = response.into_unspent_outputs();
        debug!(%address, count = outputs.len(), "Fetched spendable outputs");
        Ok(outputs)
    }

    async fn fetch_raw_transaction(&self, tx_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}?includeHex=true", self.config.transaction_endpoint, tx_id);
        let response: RawTransactionResponse = self.get_json(&url).await?;

        hex::decode(&response.hex)
            .map_err(|e| Error::Network(format!("Malformed transaction hex for {}: {}", tx_id, e)))
    }

    async fn broadcast(&self, signed_hex: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.push_endpoint)
            .json(&PushRequest { tx: signed_hex })
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "Broadcast rejected");
            return Err(push_rejection(status, &body));
        }

        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse push response: {}", e)))?;

        Ok(pushed.tx.hash)
    }

    async fn transaction_details(&self, tx_id: &str) -> Result<TransactionDetails> {
        let url = format!("{}{}", self.config.transaction_endpoint, tx_id);
        let tx: ExplorerTransaction = self.get_json(&url).await?;
        Ok(tx.into())
    }
}
