//! Common transaction types

use std::fmt;

use bitcoin::{Amount, Denomination};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{self, PrivateKey};
use crate::error::{Error, Result};

/// Supported chain families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// UTXO chain, P2PKH transfers
    Bitcoin,
    /// EVM account chain, ERC-20 token transfers
    Polygon,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Bitcoin => write!(f, "bitcoin"),
            Chain::Polygon => write!(f, "polygon"),
        }
    }
}

/// Transaction status as reported by a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is pending
    Pending,
    /// Transaction is confirmed
    Confirmed,
    /// Transaction was mined but its execution failed
    Reverted,
}

/// A validated value transfer, ready for the chain pipeline
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Target chain
    pub chain: Chain,
    /// Sender address
    pub sender_address: String,
    /// Sender signing key
    pub sender_private_key: PrivateKey,
    /// Recipient address
    pub recipient_address: String,
    /// Amount in the chain's human unit, as entered
    pub amount: String,
}

impl TransferRequest {
    /// Check the request-level invariants the front end is expected to enforce
    pub fn validate(&self) -> Result<()> {
        if self.sender_address.trim().is_empty() {
            return Err(Error::Validation("Sender address is required".to_string()));
        }
        if self.recipient_address.trim().is_empty() {
            return Err(Error::Validation("Recipient address is required".to_string()));
        }
        if same_party(self.chain, &self.sender_address, &self.recipient_address)? {
            return Err(Error::Validation("Sender and recipient must differ".to_string()));
        }
        if self.sender_private_key.chain() != self.chain {
            return Err(Error::Validation(format!(
                "Private key is for {}, request is for {}",
                self.sender_private_key.chain(),
                self.chain
            )));
        }

        match self.chain {
            Chain::Bitcoin => parse_btc_amount(&self.amount).map(|_| ()),
            Chain::Polygon => parse_token_amount(&self.amount).map(|_| ()),
        }
    }
}

// Base58 is case-sensitive; EVM addresses are compared as parsed 20-byte values.
fn same_party(chain: Chain, sender: &str, recipient: &str) -> Result<bool> {
    match chain {
        Chain::Bitcoin => Ok(sender.trim() == recipient.trim()),
        Chain::Polygon => {
            let sender = keys::polygon::parse_address(sender)?;
            let recipient = keys::polygon::parse_address(recipient)?;
            Ok(sender == recipient)
        }
    }
}

/// A successfully submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Network-assigned transaction id
    pub id: String,
    /// Chain it was submitted on
    pub chain: Chain,
}

/// Reference to a prior transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Id of the transaction that created the output
    pub source_tx_id: String,
    /// Output index within that transaction
    pub output_index: u32,
    /// Value in satoshis
    pub value_sats: u64,
    /// Whether the provider reports it as spent
    pub spent: bool,
}

/// Looked-up details of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Value in the chain's human unit
    pub value: String,
    /// Fee; satoshis for Bitcoin, gas price in gwei for Polygon
    pub fee: String,
    pub block_number: Option<u64>,
    pub confirmations: Option<u64>,
    pub status: TransactionStatus,
}

/// Convert a decimal BTC amount to satoshis.
///
/// The conversion is exact; more than eight decimal places, negative,
/// empty or non-numeric input is rejected, as is zero.
pub fn parse_btc_amount(amount: &str) -> Result<u64> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(Error::Validation("Amount is required".to_string()));
    }

    let sats = Amount::from_str_in(amount, Denomination::Bitcoin)
        .map_err(|e| Error::Validation(format!("Invalid amount '{}': {}", amount, e)))?
        .to_sat();

    if sats == 0 {
        return Err(Error::Validation("Amount must be greater than zero".to_string()));
    }
    Ok(sats)
}

/// Convert a token amount to integer base units.
///
/// No decimal scaling is applied: the token is treated as having zero
/// decimals, so fractional input is rejected.
pub fn parse_token_amount(amount: &str) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(Error::Validation("Amount is required".to_string()));
    }
    if !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "Invalid token amount '{}': expected a whole number of base units",
            amount
        )));
    }

    let units = U256::from_dec_str(amount)
        .map_err(|e| Error::Validation(format!("Invalid token amount '{}': {}", amount, e)))?;

    if units.is_zero() {
        return Err(Error::Validation("Amount must be greater than zero".to_string()));
    }
    Ok(units)
}
