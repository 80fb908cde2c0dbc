//! Shared fixtures: in-memory chain clients and well-known keys

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::serialize;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use transfer_core::crypto::keys::bitcoin::parse_address;
use transfer_core::transaction::bitcoin::{decode_transaction_hex, BitcoinClient};
use transfer_core::transaction::polygon::{
    PendingHandle, PolygonSigner, Receipt, TokenClient, TokenTransfer,
};
use transfer_core::transaction::{TransactionStatus, UnspentOutput};
use transfer_core::{EngineConfig, Error, Result, TransactionEngine};

/// Testnet P2PKH address of secret key 1
pub const BTC_SENDER: &str = "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r";
pub const BTC_SENDER_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";
pub const BTC_SENDER_WIF: &str = "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA";
/// Testnet P2PKH address of secret key 2
pub const BTC_RECIPIENT: &str = "mg8Jz5776UdyiYcBb9Z873NTozEiADRW5H";

pub const EVM_SENDER_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
/// Address of secret key 1
pub const EVM_SENDER: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
/// Address of secret key 2
pub const EVM_RECIPIENT: &str = "0x2B5AD5c4795c026514f8317c7a215E218DcCD6cF";

pub const ESTIMATED_GAS: u64 = 60_000;

/// Log to the test writer when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine over the default configuration and the given clients
pub fn engine(bitcoin: Arc<MockBitcoinClient>, polygon: Arc<MockTokenClient>) -> TransactionEngine {
    init_tracing();
    TransactionEngine::with_clients(EngineConfig::default(), bitcoin, polygon).unwrap()
}

/// A transaction paying each of `values` to `address`
pub fn funding_tx(address: &str, values: &[u64]) -> Transaction {
    let script_pubkey = parse_address(address, Network::Testnet).unwrap().script_pubkey();
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(vec![0x51]),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: values
            .iter()
            .map(|value| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: script_pubkey.clone(),
            })
            .collect(),
    }
}

/// Block explorer backed by in-memory transactions
#[derive(Default)]
pub struct MockBitcoinClient {
    outputs: Vec<UnspentOutput>,
    raw: HashMap<String, Vec<u8>>,
    reject: AtomicBool,
    pub output_fetches: AtomicUsize,
    pub raw_fetches: AtomicUsize,
    broadcasts: Mutex<Vec<String>>,
}

impl MockBitcoinClient {
    /// No spendable outputs at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// One funding transaction paying `values` to `address`
    pub fn funded(address: &str, values: &[u64]) -> Self {
        Self::default().with_funding(address, values)
    }

    /// Add another funding transaction paying `values` to `address`
    pub fn with_funding(mut self, address: &str, values: &[u64]) -> Self {
        let tx = funding_tx(address, values);
        let txid = tx.txid().to_string();
        self.outputs.extend(values.iter().enumerate().map(|(index, value)| UnspentOutput {
            source_tx_id: txid.clone(),
            output_index: index as u32,
            value_sats: *value,
            spent: false,
        }));
        self.raw.insert(txid, serialize(&tx));
        self
    }

    /// Also report a spent output whose source transaction is unknown
    pub fn with_spent_output(mut self, value_sats: u64) -> Self {
        self.outputs.push(UnspentOutput {
            source_tx_id: "ab".repeat(32),
            output_index: 0,
            value_sats,
            spent: true,
        });
        self
    }

    /// Make every later broadcast fail, or succeed again
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    /// The last transaction that reached the network
    pub fn last_broadcast(&self) -> Option<Transaction> {
        self.broadcasts
            .lock()
            .unwrap()
            .last()
            .map(|hex| decode_transaction_hex(hex).unwrap())
    }
}

#[async_trait]
impl BitcoinClient for MockBitcoinClient {
    async fn fetch_spendable_outputs(&self, _address: &str) -> Result<Vec<UnspentOutput>> {
        self.output_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.outputs.clone())
    }

    async fn fetch_raw_transaction(&self, tx_id: &str) -> Result<Vec<u8>> {
        self.raw_fetches.fetch_add(1, Ordering::SeqCst);
        self.raw
            .get(tx_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_id)))
    }

    async fn broadcast(&self, signed_hex: &str) -> Result<String> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::BroadcastRejected("Transaction rejected by mempool".to_string()));
        }
        let tx = decode_transaction_hex(signed_hex)?;
        self.broadcasts.lock().unwrap().push(signed_hex.to_string());
        Ok(tx.txid().to_string())
    }
}

/// Pauses `await_receipt` until released
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// JSON-RPC node backed by in-memory results
pub struct MockTokenClient {
    estimate_error: Option<Error>,
    receipt_status: TransactionStatus,
    gate: Option<Arc<Gate>>,
    pub estimates: AtomicUsize,
    submissions: Mutex<Vec<Bytes>>,
}

impl Default for MockTokenClient {
    fn default() -> Self {
        Self {
            estimate_error: None,
            receipt_status: TransactionStatus::Confirmed,
            gate: None,
            estimates: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }
}

impl MockTokenClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_estimate(reason: &str) -> Self {
        Self {
            estimate_error: Some(Error::Estimation(reason.to_string())),
            ..Self::default()
        }
    }

    pub fn reverting() -> Self {
        Self {
            receipt_status: TransactionStatus::Reverted,
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// Raw signed envelope of the last submission
    pub fn last_submission(&self) -> Option<Bytes> {
        self.submissions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TokenClient for MockTokenClient {
    async fn estimate_gas(&self, _from: Address, _transfer: &TokenTransfer) -> Result<U256> {
        self.estimates.fetch_add(1, Ordering::SeqCst);
        match &self.estimate_error {
            Some(e) => Err(e.clone()),
            None => Ok(U256::from(ESTIMATED_GAS)),
        }
    }

    async fn send_signed_contract_call(
        &self,
        signer: &PolygonSigner,
        transfer: &TokenTransfer,
    ) -> Result<PendingHandle> {
        let raw = signer.sign_transfer(transfer, U256::zero())?;
        let tx_hash = H256::from(keccak256(&raw));
        self.submissions.lock().unwrap().push(raw);
        Ok(PendingHandle { tx_hash })
    }

    async fn await_receipt(&self, handle: &PendingHandle) -> Result<Receipt> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(Receipt {
            transaction_id: format!("{:?}", handle.tx_hash),
            status: self.receipt_status,
        })
    }
}
