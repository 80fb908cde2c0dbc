//! In-memory address/key store

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bitcoin::Network;
use tracing::{debug, info};

use crate::crypto::keys::{self, PrivateKey};
use crate::error::{Error, Result};
use crate::transaction::Chain;

/// An imported `{address, private key}` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Address the key controls
    pub address: String,
    /// The key itself
    pub private_key: PrivateKey,
}

/// Imported keys per chain, in import order. Lives for the process only.
#[derive(Debug)]
pub struct KeyStore {
    network: Network,
    entries: RwLock<HashMap<Chain, Vec<KeyEntry>>>,
}

impl KeyStore {
    /// Create an empty store; Bitcoin addresses are derived on `network`
    pub fn new(network: Network) -> Self {
        Self {
            network,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Import a Bitcoin key given as raw hex or WIF, returning its P2PKH address
    pub fn import_bitcoin_key(&self, private_key: &str) -> Result<String> {
        let address = keys::bitcoin::address_from_private_key(private_key, self.network)?;
        self.insert(Chain::Bitcoin, address.clone(), PrivateKey::new(private_key, Chain::Bitcoin));
        info!(%address, "Imported Bitcoin key");
        Ok(address)
    }

    /// Import a Polygon key given as hex, returning its checksummed address
    pub fn import_polygon_key(&self, private_key: &str) -> Result<String> {
        let address = keys::polygon::address_from_private_key(private_key)?;
        self.insert(Chain::Polygon, address.clone(), PrivateKey::new(private_key, Chain::Polygon));
        info!(%address, "Imported Polygon key");
        Ok(address)
    }

    /// Import a key for either chain
    pub fn import_key(&self, private_key: &str, chain: Chain) -> Result<String> {
        match chain {
            Chain::Bitcoin => self.import_bitcoin_key(private_key),
            Chain::Polygon => self.import_polygon_key(private_key),
        }
    }

    /// Find the key for an address
    pub fn lookup(&self, address: &str, chain: Chain) -> Result<KeyEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&chain)
            .and_then(|list| list.iter().find(|entry| same_address(&entry.address, address, chain)))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No {} key for address {}", chain, address)))
    }

    /// Stored addresses for a chain, in import order
    pub fn addresses(&self, chain: Chain) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&chain)
            .map(|list| list.iter().map(|entry| entry.address.clone()).collect())
            .unwrap_or_default()
    }

    fn insert(&self, chain: Chain, address: String, private_key: PrivateKey) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let list = entries.entry(chain).or_default();

        match list.iter_mut().find(|entry| same_address(&entry.address, &address, chain)) {
            Some(existing) => {
                debug!(%address, %chain, "Key already imported, replacing");
                existing.private_key = private_key;
            }
            None => list.push(KeyEntry { address, private_key }),
        }
    }
}

// EVM addresses compare case-insensitively, base58 addresses do not.
fn same_address(a: &str, b: &str, chain: Chain) -> bool {
    match chain {
        Chain::Bitcoin => a == b.trim(),
        Chain::Polygon => a.eq_ignore_ascii_case(b.trim()),
    }
}
