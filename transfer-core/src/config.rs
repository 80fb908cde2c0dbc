//! Engine configuration
//!
//! Endpoint URLs, the token contract and the fee policy are external
//! configuration. They can be built in code, or loaded from a JSON endpoint
//! map such as:
//!
//! ```json
//! {
//!   "bitcoin": { "network": "testnet", "max_fee_sats": 20000 },
//!   "polygon": { "rpc_url": "https://rpc-mumbai.matic.today", "chain_id": 80001 }
//! }
//! ```
//!
//! Missing fields fall back to the defaults below.

use std::path::Path;
use std::str::FromStr;

use bitcoin::Network;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_ADDRESS_ENDPOINT: &str = "https://api.blockcypher.com/v1/btc/test3/addrs/";
const DEFAULT_TRANSACTION_ENDPOINT: &str = "https://api.blockcypher.com/v1/btc/test3/txs/";
const DEFAULT_PUSH_ENDPOINT: &str = "https://api.blockcypher.com/v1/btc/test3/txs/push";
const DEFAULT_POLYGON_RPC: &str = "https://rpc-mumbai.matic.today";
const DEFAULT_TOKEN_CONTRACT: &str = "0x466DD1e48570FAA2E7f69B75139813e4F8EF75c2";

/// Mumbai testnet
const DEFAULT_CHAIN_ID: u64 = 80001;
const DEFAULT_GAS_PRICE_GWEI: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// UTXO chain settings
    pub bitcoin: BitcoinConfig,
    /// Account chain settings
    pub polygon: PolygonConfig,
}

/// Block-explorer REST settings for the UTXO chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// Network addresses and WIF keys must belong to
    pub network: Network,
    /// Prefix for the unspent-output query, the address is appended
    pub address_endpoint: String,
    /// Prefix for the raw transaction query, the txid is appended
    pub transaction_endpoint: String,
    /// Raw transaction push endpoint
    pub push_endpoint: String,
    /// Upper bound on the implicit fee (inputs minus amount). `None` accepts any residual.
    pub max_fee_sats: Option<u64>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            address_endpoint: DEFAULT_ADDRESS_ENDPOINT.to_string(),
            transaction_endpoint: DEFAULT_TRANSACTION_ENDPOINT.to_string(),
            push_endpoint: DEFAULT_PUSH_ENDPOINT.to_string(),
            max_fee_sats: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// JSON-RPC settings for the account chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Chain id used for EIP-155 signing
    pub chain_id: u64,
    /// ERC-20 token contract the transfers are sent to
    pub token_contract: String,
    /// Fixed gas price in gwei
    pub gas_price_gwei: u64,
}

impl Default for PolygonConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_POLYGON_RPC.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            token_contract: DEFAULT_TOKEN_CONTRACT.to_string(),
            gas_price_gwei: DEFAULT_GAS_PRICE_GWEI,
        }
    }
}

impl PolygonConfig {
    /// Parsed token contract address
    pub fn token_contract_address(&self) -> Result<Address> {
        Address::from_str(&self.token_contract)
            .map_err(|e| Error::Config(format!("Invalid token contract address: {}", e)))
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Semantic checks serde cannot express
    pub fn validate(&self) -> Result<()> {
        let endpoints = [
            ("bitcoin.address_endpoint", &self.bitcoin.address_endpoint),
            ("bitcoin.transaction_endpoint", &self.bitcoin.transaction_endpoint),
            ("bitcoin.push_endpoint", &self.bitcoin.push_endpoint),
            ("polygon.rpc_url", &self.polygon.rpc_url),
        ];
        for (name, url) in endpoints {
            if url.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }

        if self.bitcoin.timeout_secs == 0 {
            return Err(Error::Config("bitcoin.timeout_secs must be greater than zero".to_string()));
        }
        if self.polygon.gas_price_gwei == 0 {
            return Err(Error::Config("polygon.gas_price_gwei must be greater than zero".to_string()));
        }

        self.polygon.token_contract_address()?;
        Ok(())
    }
}
