//! Legacy P2PKH signing

use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::ecdsa::Signature;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Network, PrivateKey as BitcoinPrivateKey, PublicKey, Transaction, Txid};
use secp256k1::{Message, Secp256k1};
use tracing::debug;

use crate::crypto::keys::bitcoin::parse_private_key;
use crate::crypto::keys::PrivateKey;
use crate::error::{Error, Result};
use super::builder::UnsignedTransaction;

/// A finalized, broadcastable transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
}

impl SignedTransaction {
    /// Consensus-encoded bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        serialize(&self.tx)
    }

    /// Consensus-encoded bytes as lowercase hex, as pushed to the network
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Id the network will assign
    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }

    /// The underlying transaction
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }
}

/// Decode a hex-encoded transaction
pub fn decode_transaction_hex(raw: &str) -> Result<Transaction> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| Error::Serialization(format!("Invalid transaction hex: {}", e)))?;
    deserialize(&bytes).map_err(|e| Error::Serialization(format!("Invalid transaction: {}", e)))
}

/// Signs every input with one P2PKH key
#[derive(Debug)]
pub struct BitcoinSigner {
    private_key: BitcoinPrivateKey,
    public_key: PublicKey,
    network: Network,
}

impl BitcoinSigner {
    /// Create a signer from raw hex or WIF key text
    pub fn from_private_key(private_key: &PrivateKey, network: Network) -> Result<Self> {
        let private_key = parse_private_key(private_key.expose_secret(), network)?;
        let secp = Secp256k1::signing_only();
        let public_key = private_key.public_key(&secp);

        Ok(Self {
            private_key,
            public_key,
            network,
        })
    }

    /// The P2PKH address this key controls
    pub fn address(&self) -> Address {
        Address::p2pkh(&self.public_key, self.network)
    }

    /// Fail unless this key controls `address`
    pub fn ensure_controls(&self, address: &str) -> Result<()> {
        let derived = self.address().to_string();
        if derived != address.trim() {
            return Err(Error::AddressKeyMismatch {
                address: address.to_string(),
                derived,
            });
        }
        Ok(())
    }

    /// Sign all inputs in order with SIGHASH_ALL and finalize
    pub fn sign(&self, unsigned: &UnsignedTransaction) -> Result<SignedTransaction> {
        if unsigned.network != self.network {
            return Err(Error::Signing(format!(
                "Transaction is for {}, signer is for {}",
                unsigned.network, self.network
            )));
        }

        let unsigned_tx = unsigned.to_bitcoin_transaction()?;
        let own_script = self.address().script_pubkey();
        let secp = Secp256k1::signing_only();
        let cache = SighashCache::new(&unsigned_tx);

        let mut script_sigs = Vec::with_capacity(unsigned.inputs.len());
        for (index, input) in unsigned.inputs.iter().enumerate() {
            let script_pubkey = &input.prevout.script_pubkey;
            if *script_pubkey != own_script {
                return Err(Error::Signing(format!(
                    "Output {}:{} is not locked to {}",
                    input.source_tx_id,
                    input.output_index,
                    self.address()
                )));
            }

            let sighash = cache
                .legacy_signature_hash(index, script_pubkey, EcdsaSighashType::All.to_u32())
                .map_err(|e| Error::Signing(format!("Sighash computation failed for input {}: {}", index, e)))?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = Signature {
                sig: secp.sign_ecdsa(&message, &self.private_key.inner),
                hash_ty: EcdsaSighashType::All,
            };

            let signature_push = PushBytesBuf::try_from(signature.to_vec())
                .map_err(|e| Error::Signing(format!("Signature too long: {}", e)))?;

            let script_sig = Builder::new()
                .push_slice(signature_push)
                .push_key(&self.public_key)
                .into_script();
            script_sigs.push(script_sig);
        }

        let mut tx = unsigned_tx.clone();
        for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            input.script_sig = script_sig;
        }

        debug!(txid = %tx.txid(), inputs = tx.input.len(), "Signed transaction");
        Ok(SignedTransaction { tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::bitcoin::builder::build_transaction;
    use crate::transaction::bitcoin::test_support::{funding_tx, RECIPIENT, SENDER, SENDER_KEY_HEX, SENDER_WIF};
    use crate::transaction::types::UnspentOutput;
    use crate::transaction::Chain;

    fn unsigned_for(values: &[u64], amount: u64) -> UnsignedTransaction {
        let source = funding_tx(SENDER, values);
        let raw = serialize(&source);
        let utxos: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, value)| UnspentOutput {
                source_tx_id: source.txid().to_string(),
                output_index: i as u32,
                value_sats: *value,
                spent: false,
            })
            .collect();
        let raws = vec![raw; values.len()];
        build_transaction(&utxos, &raws, RECIPIENT, amount, Network::Testnet, None).unwrap()
    }

    #[test]
    fn test_raw_and_wif_keys_produce_same_signer() {
        let raw = BitcoinSigner::from_private_key(&PrivateKey::new(SENDER_KEY_HEX, Chain::Bitcoin), Network::Testnet).unwrap();
        let wif = BitcoinSigner::from_private_key(&PrivateKey::new(SENDER_WIF, Chain::Bitcoin), Network::Testnet).unwrap();
        assert_eq!(raw.address(), wif.address());
        assert!(raw.ensure_controls(SENDER).is_ok());
    }

    #[test]
    fn test_address_key_mismatch() {
        let signer = BitcoinSigner::from_private_key(&PrivateKey::new(SENDER_WIF, Chain::Bitcoin), Network::Testnet).unwrap();
        let result = signer.ensure_controls(RECIPIENT);
        assert!(matches!(result, Err(Error::AddressKeyMismatch { .. })));
    }

    #[test]
    fn test_signed_hex_round_trips() {
        let unsigned = unsigned_for(&[40_000, 60_000], 90_000);
        let signer = BitcoinSigner::from_private_key(&PrivateKey::new(SENDER_WIF, Chain::Bitcoin), Network::Testnet).unwrap();
        let signed = signer.sign(&unsigned).unwrap();

        let decoded = decode_transaction_hex(&signed.to_hex()).unwrap();
        assert_eq!(decoded.version.0, unsigned.version);
        assert_eq!(decoded.lock_time.to_consensus_u32(), unsigned.lock_time);
        assert_eq!(decoded.input.len(), unsigned.inputs.len());
        for (txin, input) in decoded.input.iter().zip(&unsigned.inputs) {
            assert_eq!(txin.previous_output.txid, input.source_tx_id);
            assert_eq!(txin.previous_output.vout, input.output_index);
            assert!(!txin.script_sig.is_empty());
        }
        assert_eq!(decoded.output.len(), 1);
        let recipient = Address::from_script(&decoded.output[0].script_pubkey, Network::Testnet).unwrap();
        assert_eq!(recipient.to_string(), RECIPIENT);
        assert_eq!(decoded.output[0].value.to_sat(), 90_000);
        assert_eq!(decoded.txid(), signed.txid());
    }

    #[test]
    fn test_signatures_verify() {
        let unsigned = unsigned_for(&[100_000], 50_000);
        let signer = BitcoinSigner::from_private_key(&PrivateKey::new(SENDER_KEY_HEX, Chain::Bitcoin), Network::Testnet).unwrap();
        let signed = signer.sign(&unsigned).unwrap();

        let tx = signed.transaction();
        let mut instructions = tx.input[0].script_sig.instructions();
        let sig_push = instructions.next().unwrap().unwrap();
        let key_push = instructions.next().unwrap().unwrap();

        let sig_bytes = sig_push.push_bytes().unwrap().as_bytes();
        let signature = Signature::from_slice(sig_bytes).unwrap();
        assert_eq!(signature.hash_ty, EcdsaSighashType::All);
        let public_key = PublicKey::from_slice(key_push.push_bytes().unwrap().as_bytes()).unwrap();

        let unsigned_tx = unsigned.to_bitcoin_transaction().unwrap();
        let sighash = SighashCache::new(&unsigned_tx)
            .legacy_signature_hash(0, &unsigned.inputs[0].prevout.script_pubkey, EcdsaSighashType::All.to_u32())
            .unwrap();
        let message = Message::from_digest(sighash.to_byte_array());

        let secp = Secp256k1::verification_only();
        assert!(secp.verify_ecdsa(&message, &signature.sig, &public_key.inner).is_ok());
    }

    #[test]
    fn test_foreign_output_is_not_signed() {
        let unsigned = unsigned_for(&[100_000], 50_000);
        let other_key = "0000000000000000000000000000000000000000000000000000000000000003";
        let signer = BitcoinSigner::from_private_key(&PrivateKey::new(other_key, Chain::Bitcoin), Network::Testnet).unwrap();
        assert!(matches!(signer.sign(&unsigned), Err(Error::Signing(_))));
    }
}
