//! JSON-RPC client for the account chain

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Transaction, TransactionReceipt, H256, U256, U64};
use ethers::utils::{format_ether, format_units};
use tracing::{debug, warn};

use crate::config::PolygonConfig;
use crate::error::{Error, Result};
use crate::transaction::types::{TransactionDetails, TransactionStatus};
use super::builder::TokenTransfer;
use super::signer::PolygonSigner;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A submitted, not yet mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHandle {
    pub tx_hash: H256,
}

/// Inclusion receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// `0x`-prefixed transaction hash
    pub transaction_id: String,
    /// `Confirmed` or `Reverted`
    pub status: TransactionStatus,
}

/// Network access the Polygon pipeline needs
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Gas the transfer call would use when sent from `from`
    async fn estimate_gas(&self, from: Address, transfer: &TokenTransfer) -> Result<U256>;

    /// Sign the call with `signer` and submit it
    async fn send_signed_contract_call(
        &self,
        signer: &PolygonSigner,
        transfer: &TokenTransfer,
    ) -> Result<PendingHandle>;

    /// Wait until the transaction is mined
    async fn await_receipt(&self, handle: &PendingHandle) -> Result<Receipt>;

    /// Look up a transaction for display
    async fn transaction_details(&self, tx_hash: &str) -> Result<TransactionDetails> {
        Err(Error::NotSupported(format!("Transaction details for {}", tx_hash)))
    }
}

/// `ethers` HTTP provider client
pub struct PolygonClient {
    provider: Provider<Http>,
}

impl PolygonClient {
    /// Create a new client
    pub fn new(config: &PolygonConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| Error::Config(format!("Failed to create Polygon provider: {}", e)))?
            .interval(RECEIPT_POLL_INTERVAL);

        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenClient for PolygonClient {
    async fn estimate_gas(&self, from: Address, transfer: &TokenTransfer) -> Result<U256> {
        let tx: TypedTransaction = transfer.to_request(from).into();
        let gas = self
            .provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| Error::Estimation(e.to_string()))?;

        debug!(%gas, "Estimated transfer gas");
        Ok(gas)
    }

    async fn send_signed_contract_call(
        &self,
        signer: &PolygonSigner,
        transfer: &TokenTransfer,
    ) -> Result<PendingHandle> {
        let nonce = self
            .provider
            .get_transaction_count(signer.address(), Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch nonce: {}", e)))?;

        let raw = signer.sign_transfer(transfer, nonce)?;
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| Error::BroadcastRejected(e.to_string()))?;

        let tx_hash = pending.tx_hash();
        debug!(?tx_hash, %nonce, "Submitted transfer");
        Ok(PendingHandle { tx_hash })
    }

    async fn await_receipt(&self, handle: &PendingHandle) -> Result<Receipt> {
        let receipt = PendingTransaction::new(handle.tx_hash, &self.provider)
            .confirmations(1)
            .await
            .map_err(|e| Error::Network(format!("Failed to wait for receipt: {}", e)))?;

        receipt_outcome(handle.tx_hash, receipt)
    }

    async fn transaction_details(&self, tx_hash: &str) -> Result<TransactionDetails> {
        let hash = H256::from_str(tx_hash.trim())
            .map_err(|e| Error::Validation(format!("Invalid transaction hash '{}': {}", tx_hash, e)))?;

        let tx = self
            .provider
            .get_transaction(hash)
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch transaction: {}", e)))?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_hash)))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch receipt: {}", e)))?;

        let head = match tx.block_number {
            Some(_) => Some(
                self.provider
                    .get_block_number()
                    .await
                    .map_err(|e| Error::Network(format!("Failed to fetch block number: {}", e)))?,
            ),
            None => None,
        };

        details_from(&tx, receipt.as_ref(), head)
    }
}

/// Map a mined receipt onto the transfer outcome; `None` means the
/// transaction left the mempool without being mined.
fn receipt_outcome(tx_hash: H256, receipt: Option<TransactionReceipt>) -> Result<Receipt> {
    let receipt = receipt.ok_or_else(|| Error::Network(format!("Transaction {:?} was dropped", tx_hash)))?;

    let status = if receipt.status == Some(U64::one()) {
        TransactionStatus::Confirmed
    } else {
        warn!(tx_hash = ?receipt.transaction_hash, "Transfer reverted");
        TransactionStatus::Reverted
    };

    Ok(Receipt {
        transaction_id: format!("{:?}", receipt.transaction_hash),
        status,
    })
}

/// Display details for a transaction, its receipt if any and the chain head
fn details_from(
    tx: &Transaction,
    receipt: Option<&TransactionReceipt>,
    head: Option<U64>,
) -> Result<TransactionDetails> {
    let confirmations = match (tx.block_number, head) {
        (Some(mined_at), Some(head)) => Some(head.saturating_sub(mined_at).as_u64() + 1),
        _ => None,
    };

    let fee = match tx.gas_price {
        Some(gas_price) => format_units(gas_price, "gwei")
            .map_err(|e| Error::Serialization(format!("Invalid gas price: {}", e)))?,
        None => "0".to_string(),
    };

    let status = match receipt.and_then(|r| r.status) {
        Some(status) if status == U64::one() => TransactionStatus::Confirmed,
        _ => TransactionStatus::Pending,
    };

    Ok(TransactionDetails {
        hash: format!("{:?}", tx.hash),
        from: Some(format!("{:?}", tx.from)),
        to: tx.to.map(|to| format!("{:?}", to)),
        value: format_ether(tx.value),
        fee,
        block_number: tx.block_number.map(|n| n.as_u64()),
        confirmations,
        status,
    })
}
