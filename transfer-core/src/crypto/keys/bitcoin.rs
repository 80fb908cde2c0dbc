//! Bitcoin key handling

use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, PrivateKey as BitcoinPrivateKey, PublicKey};
use secp256k1::{Secp256k1, SecretKey};

pub use bitcoin::Network;

use crate::error::{Error, Result};

/// Length of a raw hex-encoded secp256k1 secret
const RAW_HEX_KEY_LEN: usize = 64;

/// Parse a private key given as 64-char raw hex or as WIF.
///
/// Raw keys are taken as compressed keys on `network`. A WIF key must be
/// encoded for `network`.
pub fn parse_private_key(private_key: &str, network: Network) -> Result<BitcoinPrivateKey> {
    let private_key = private_key.trim();

    if private_key.len() == RAW_HEX_KEY_LEN && private_key.bytes().all(|b| b.is_ascii_hexdigit()) {
        let bytes = hex::decode(private_key)
            .map_err(|e| Error::KeyDerivation(format!("Invalid hex private key: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| Error::KeyDerivation(format!("Invalid secret key: {}", e)))?;
        return Ok(BitcoinPrivateKey::new(secret_key, network));
    }

    let key = BitcoinPrivateKey::from_wif(private_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid WIF private key: {}", e)))?;

    if !same_address_family(key.network, network) {
        return Err(Error::KeyDerivation(format!(
            "WIF key is for {}, expected {}",
            key.network, network
        )));
    }

    Ok(key)
}

/// Get the P2PKH address of a public key
pub fn public_key_to_address(public_key: &PublicKey, network: Network) -> String {
    Address::p2pkh(public_key, network).to_string()
}

/// Derive the P2PKH address a private key controls
pub fn address_from_private_key(private_key: &str, network: Network) -> Result<String> {
    let key = parse_private_key(private_key, network)?;
    let secp = Secp256k1::signing_only();
    Ok(public_key_to_address(&key.public_key(&secp), network))
}

/// Parse an address and require it to belong to `network`
pub fn parse_address(address: &str, network: Network) -> Result<Address> {
    Address::<NetworkUnchecked>::from_str(address.trim())
        .map_err(|e| Error::Validation(format!("Invalid Bitcoin address '{}': {}", address, e)))?
        .require_network(network)
        .map_err(|e| Error::Validation(format!("Address '{}' is not on {}: {}", address, network, e)))
}

// WIF only distinguishes mainnet from the test networks.
fn same_address_family(a: Network, b: Network) -> bool {
    (a == Network::Bitcoin) == (b == Network::Bitcoin)
}
