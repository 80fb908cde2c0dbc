//! Local signing for Polygon transactions

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, U256};

use crate::crypto::keys::polygon::{checksum_address, wallet_from_private_key};
use crate::crypto::keys::PrivateKey;
use crate::error::{Error, Result};
use super::builder::TokenTransfer;

/// A wallet bound to the configured chain id
#[derive(Debug, Clone)]
pub struct PolygonSigner {
    wallet: LocalWallet,
}

impl PolygonSigner {
    /// Create a signer from a hex private key
    pub fn from_private_key(private_key: &PrivateKey, chain_id: u64) -> Result<Self> {
        let wallet = wallet_from_private_key(private_key.expose_secret(), chain_id)?;
        Ok(Self { wallet })
    }

    /// Account the key controls
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Chain id signatures are bound to
    pub fn chain_id(&self) -> u64 {
        self.wallet.chain_id()
    }

    /// Fail unless this key controls `address`
    pub fn ensure_controls(&self, address: &str) -> Result<()> {
        let derived = checksum_address(&self.address());
        if !derived.eq_ignore_ascii_case(address.trim()) {
            return Err(Error::AddressKeyMismatch {
                address: address.to_string(),
                derived,
            });
        }
        Ok(())
    }

    /// Sign the transfer with `nonce`, returning the raw RLP envelope
    pub fn sign_transfer(&self, transfer: &TokenTransfer, nonce: U256) -> Result<Bytes> {
        if transfer.gas_limit.is_none() {
            return Err(Error::Signing("Gas limit must be set before signing".to_string()));
        }

        let request = transfer
            .to_request(self.address())
            .nonce(nonce)
            .chain_id(self.chain_id());
        let tx: TypedTransaction = request.into();

        let signature = self
            .wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| Error::Signing(format!("Failed to sign transaction: {}", e)))?;

        Ok(tx.rlp_signed(&signature))
    }
}
