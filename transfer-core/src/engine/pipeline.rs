//! Per-chain submit pipelines

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::Network;
use ethers::types::{Address, U256};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crypto::keys;
use crate::error::{Error, Result};
use crate::transaction::bitcoin::{build_transaction, BitcoinClient, BitcoinSigner};
use crate::transaction::polygon::{gwei, PolygonSigner, TokenClient, TokenTransfer};
use crate::transaction::{parse_btc_amount, parse_token_amount, TransactionStatus, TransferRequest};

/// Build, sign and submit one validated request, returning the chain's
/// transaction id.
#[async_trait]
pub trait TransferPipeline: Send + Sync {
    async fn submit(&self, request: &TransferRequest) -> Result<String>;
}

/// Spend-all P2PKH transfer through a block explorer
pub struct BitcoinPipeline {
    client: Arc<dyn BitcoinClient>,
    network: Network,
    max_fee_sats: Option<u64>,
}

impl BitcoinPipeline {
    pub fn new(client: Arc<dyn BitcoinClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            network: config.bitcoin.network,
            max_fee_sats: config.bitcoin.max_fee_sats,
        }
    }
}

#[async_trait]
impl TransferPipeline for BitcoinPipeline {
    async fn submit(&self, request: &TransferRequest) -> Result<String> {
        let amount_sats = parse_btc_amount(&request.amount)?;
        let signer = BitcoinSigner::from_private_key(&request.sender_private_key, self.network)?;
        signer.ensure_controls(&request.sender_address)?;
        keys::bitcoin::parse_address(&request.recipient_address, self.network)?;

        let mut spendable = self.client.fetch_spendable_outputs(&request.sender_address).await?;
        spendable.retain(|output| !output.spent);
        if spendable.is_empty() {
            return Err(Error::InsufficientFunds {
                available: 0,
                requested: amount_sats,
            });
        }
        debug!(count = spendable.len(), "Fetched spendable outputs");

        // Several outputs may come from one transaction; fetch each once.
        let mut seen = HashSet::new();
        let unique_ids: Vec<&str> = spendable
            .iter()
            .map(|output| output.source_tx_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        let fetched =
            try_join_all(unique_ids.iter().map(|id| self.client.fetch_raw_transaction(id))).await?;
        let raw_by_id: HashMap<&str, Vec<u8>> = unique_ids.into_iter().zip(fetched).collect();

        let source_txs = spendable
            .iter()
            .map(|output| {
                raw_by_id.get(output.source_tx_id.as_str()).cloned().ok_or_else(|| {
                    Error::NotFound(format!("Source transaction {}", output.source_tx_id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let unsigned = build_transaction(
            &spendable,
            &source_txs,
            &request.recipient_address,
            amount_sats,
            self.network,
            self.max_fee_sats,
        )?;
        info!(
            inputs = unsigned.inputs.len(),
            amount_sats,
            fee_sats = unsigned.implicit_fee_sats(),
            "Built Bitcoin transaction"
        );

        let signed = signer.sign(&unsigned)?;
        let local_txid = signed.txid().to_string();
        let tx_id = self.client.broadcast(&signed.to_hex()).await?;
        if tx_id != local_txid {
            warn!(%tx_id, %local_txid, "Explorer reported a different transaction id");
        }
        Ok(tx_id)
    }
}

/// ERC-20 `transfer` through JSON-RPC
pub struct PolygonPipeline {
    client: Arc<dyn TokenClient>,
    chain_id: u64,
    contract: Address,
    gas_price: U256,
}

impl PolygonPipeline {
    pub fn new(client: Arc<dyn TokenClient>, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            client,
            chain_id: config.polygon.chain_id,
            contract: config.polygon.token_contract_address()?,
            gas_price: gwei(config.polygon.gas_price_gwei),
        })
    }
}

#[async_trait]
impl TransferPipeline for PolygonPipeline {
    async fn submit(&self, request: &TransferRequest) -> Result<String> {
        let amount = parse_token_amount(&request.amount)?;
        let recipient = keys::polygon::parse_address(&request.recipient_address)?;
        let signer = PolygonSigner::from_private_key(&request.sender_private_key, self.chain_id)?;
        signer.ensure_controls(&request.sender_address)?;

        let transfer = TokenTransfer::new(self.contract, recipient, amount, self.gas_price);
        let gas_limit = self.client.estimate_gas(signer.address(), &transfer).await?;
        debug!(%gas_limit, "Estimated transfer gas");
        let transfer = transfer.with_gas_limit(gas_limit);

        let handle = self.client.send_signed_contract_call(&signer, &transfer).await?;
        info!(tx_hash = ?handle.tx_hash, "Submitted token transfer, awaiting receipt");

        let receipt = self.client.await_receipt(&handle).await?;
        match receipt.status {
            TransactionStatus::Confirmed => Ok(receipt.transaction_id),
            _ => Err(Error::Reverted(receipt.transaction_id)),
        }
    }
}
