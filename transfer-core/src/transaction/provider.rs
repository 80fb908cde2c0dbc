//! Chain client construction

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use super::bitcoin::{BitcoinClient, BlockcypherClient};
use super::polygon::{PolygonClient, TokenClient};

/// Provider factory
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the block-explorer client for the UTXO chain
    pub fn bitcoin_client(config: &EngineConfig) -> Result<Arc<dyn BitcoinClient>> {
        let client = BlockcypherClient::new(config.bitcoin.clone())?;
        Ok(Arc::new(client))
    }

    /// Create the JSON-RPC client for the account chain
    pub fn polygon_client(config: &EngineConfig) -> Result<Arc<dyn TokenClient>> {
        let client = PolygonClient::new(&config.polygon)?;
        Ok(Arc::new(client))
    }
}
