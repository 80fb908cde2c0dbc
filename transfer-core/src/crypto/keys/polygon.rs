//! Polygon (EVM) key handling

use std::str::FromStr;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use ethers::utils::to_checksum;

use crate::error::{Error, Result};

/// Build a local wallet from a hex private key, bound to `chain_id`
pub fn wallet_from_private_key(private_key: &str, chain_id: u64) -> Result<LocalWallet> {
    let private_key = private_key.trim();
    let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
    if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::KeyDerivation(
            "Private key must be 32 bytes of hex".to_string(),
        ));
    }

    let wallet = digits
        .parse::<LocalWallet>()
        .map_err(|e| Error::KeyDerivation(format!("Invalid private key: {}", e)))?
        .with_chain_id(chain_id);

    Ok(wallet)
}

/// Get the checksummed address of an account
pub fn checksum_address(address: &Address) -> String {
    to_checksum(address, None)
}

/// Derive the checksummed address a private key controls
pub fn address_from_private_key(private_key: &str) -> Result<String> {
    // The chain id does not affect the address.
    let wallet = wallet_from_private_key(private_key, 1)?;
    Ok(checksum_address(&wallet.address()))
}

/// Parse a `0x`-prefixed (or bare) 20-byte account address
pub fn parse_address(address: &str) -> Result<Address> {
    Address::from_str(address.trim())
        .map_err(|e| Error::Validation(format!("Invalid Polygon address '{}': {}", address, e)))
}
