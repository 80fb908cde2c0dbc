//! Unsigned P2PKH transaction assembly
//!
//! Every spendable output is consumed and exactly one payment output is
//! created. There is no change output, so the whole residual
//! (`inputs - amount`) is left to the miner as fee.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::deserialize;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use tracing::debug;

use crate::crypto::keys::bitcoin::parse_address;
use crate::error::{Error, Result};
use crate::transaction::types::UnspentOutput;

/// Transaction version used for every transfer
pub const TX_VERSION: i32 = 1;

/// Locktime used for every transfer
pub const TX_LOCK_TIME: u32 = 0;

/// An input together with the full transaction it spends from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedInput {
    pub source_tx_id: Txid,
    pub output_index: u32,
    /// Raw bytes of the source transaction
    pub full_source_tx: Vec<u8>,
    /// The spent output, taken from `full_source_tx`
    pub prevout: TxOut,
}

/// A payment output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: String,
    pub value_sats: u64,
}

/// A transaction ready to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub version: i32,
    pub lock_time: u32,
    pub inputs: Vec<UnsignedInput>,
    pub outputs: Vec<PaymentOutput>,
    pub network: Network,
}

impl UnsignedTransaction {
    /// Sum of all input values
    pub fn total_input_sats(&self) -> u64 {
        self.inputs.iter().map(|input| input.prevout.value.to_sat()).sum()
    }

    /// Sum of all output values
    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|output| output.value_sats).sum()
    }

    /// Fee left to the miner
    pub fn implicit_fee_sats(&self) -> u64 {
        self.total_input_sats().saturating_sub(self.total_output_sats())
    }

    /// The consensus transaction with empty signature scripts
    pub fn to_bitcoin_transaction(&self) -> Result<Transaction> {
        let input = self
            .inputs
            .iter()
            .map(|input| TxIn {
                previous_output: OutPoint::new(input.source_tx_id, input.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            })
            .collect();

        let output = self
            .outputs
            .iter()
            .map(|output| {
                let address = parse_address(&output.address, self.network)?;
                Ok(TxOut {
                    value: Amount::from_sat(output.value_sats),
                    script_pubkey: address.script_pubkey(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Transaction {
            version: Version(self.version),
            lock_time: LockTime::from_consensus(self.lock_time),
            input,
            output,
        })
    }
}

/// Build the unsigned transfer.
///
/// `spendable` and `source_txs` are paired by position. Outputs flagged as
/// spent are skipped. `max_fee_sats` bounds the implicit fee when set.
pub fn build_transaction(
    spendable: &[UnspentOutput],
    source_txs: &[Vec<u8>],
    recipient: &str,
    amount_sats: u64,
    network: Network,
    max_fee_sats: Option<u64>,
) -> Result<UnsignedTransaction> {
    if amount_sats == 0 {
        return Err(Error::Validation("Amount must be greater than zero".to_string()));
    }
    if spendable.len() != source_txs.len() {
        return Err(Error::Transaction(format!(
            "Got {} source transactions for {} outputs",
            source_txs.len(),
            spendable.len()
        )));
    }

    // Fail on a bad recipient before any per-input work.
    parse_address(recipient, network)?;

    let mut inputs = Vec::with_capacity(spendable.len());
    let mut total_input_sats: u64 = 0;

    for (utxo, raw) in spendable.iter().zip(source_txs) {
        if utxo.spent {
            debug!(tx = %utxo.source_tx_id, index = utxo.output_index, "Skipping spent output");
            continue;
        }

        let input = resolve_input(utxo, raw)?;
        total_input_sats = total_input_sats
            .checked_add(input.prevout.value.to_sat())
            .ok_or_else(|| Error::Transaction("Input total overflows".to_string()))?;
        inputs.push(input);
    }

    if inputs.is_empty() || total_input_sats < amount_sats {
        return Err(Error::InsufficientFunds {
            available: total_input_sats,
            requested: amount_sats,
        });
    }

    let fee_sats = total_input_sats - amount_sats;
    if let Some(max_fee) = max_fee_sats {
        if fee_sats > max_fee {
            return Err(Error::Validation(format!(
                "Implicit fee of {} sats exceeds the {} sat limit; spend a smaller set of outputs or raise the amount",
                fee_sats, max_fee
            )));
        }
    }

    debug!(
        inputs = inputs.len(),
        total_input_sats,
        amount_sats,
        fee_sats,
        "Built unsigned transaction"
    );

    Ok(UnsignedTransaction {
        version: TX_VERSION,
        lock_time: TX_LOCK_TIME,
        inputs,
        outputs: vec![PaymentOutput {
            address: recipient.trim().to_string(),
            value_sats: amount_sats,
        }],
        network,
    })
}

// Decode the source transaction and pull out the output being spent.
fn resolve_input(utxo: &UnspentOutput, raw: &[u8]) -> Result<UnsignedInput> {
    let source_tx_id = Txid::from_str(&utxo.source_tx_id)
        .map_err(|e| Error::Transaction(format!("Invalid txid {}: {}", utxo.source_tx_id, e)))?;

    let source_tx: Transaction = deserialize(raw)
        .map_err(|e| Error::Serialization(format!("Invalid source transaction {}: {}", source_tx_id, e)))?;

    if source_tx.txid() != source_tx_id {
        return Err(Error::Transaction(format!(
            "Source transaction bytes hash to {}, expected {}",
            source_tx.txid(),
            source_tx_id
        )));
    }

    let prevout = source_tx
        .output
        .get(utxo.output_index as usize)
        .cloned()
        .ok_or_else(|| {
            Error::NotFound(format!("Output {} not found in {}", utxo.output_index, source_tx_id))
        })?;

    if prevout.value.to_sat() != utxo.value_sats {
        return Err(Error::Transaction(format!(
            "Output {}:{} holds {} sats, provider reported {}",
            source_tx_id,
            utxo.output_index,
            prevout.value.to_sat(),
            utxo.value_sats
        )));
    }

    Ok(UnsignedInput {
        source_tx_id,
        output_index: utxo.output_index,
        full_source_tx: raw.to_vec(),
        prevout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::bitcoin::test_support::{funding_tx, SENDER, RECIPIENT};
    use bitcoin::consensus::encode::serialize;

    fn utxo(tx: &Transaction, index: u32) -> UnspentOutput {
        UnspentOutput {
            source_tx_id: tx.txid().to_string(),
            output_index: index,
            value_sats: tx.output[index as usize].value.to_sat(),
            spent: false,
        }
    }

    #[test]
    fn test_single_output_spends_everything() {
        let source = funding_tx(SENDER, &[100_000]);
        let unsigned = build_transaction(
            &[utxo(&source, 0)],
            &[serialize(&source)],
            RECIPIENT,
            50_000,
            Network::Testnet,
            None,
        )
        .unwrap();

        assert_eq!(unsigned.version, 1);
        assert_eq!(unsigned.lock_time, 0);
        assert_eq!(unsigned.inputs.len(), 1);
        assert_eq!(unsigned.inputs[0].source_tx_id, source.txid());
        assert_eq!(unsigned.outputs, vec![PaymentOutput { address: RECIPIENT.to_string(), value_sats: 50_000 }]);
        assert_eq!(unsigned.implicit_fee_sats(), 50_000);
    }

    #[test]
    fn test_all_outputs_become_inputs() {
        let source = funding_tx(SENDER, &[10_000, 20_000, 30_000]);
        let raw = serialize(&source);
        let utxos: Vec<_> = (0..3).map(|i| utxo(&source, i)).collect();

        let unsigned = build_transaction(
            &utxos,
            &[raw.clone(), raw.clone(), raw],
            RECIPIENT,
            55_000,
            Network::Testnet,
            None,
        )
        .unwrap();

        assert_eq!(unsigned.inputs.len(), 3);
        assert_eq!(unsigned.total_input_sats(), 60_000);
        assert_eq!(unsigned.outputs.len(), 1);
    }

    #[test]
    fn test_spent_outputs_are_skipped() {
        let source = funding_tx(SENDER, &[10_000, 20_000]);
        let raw = serialize(&source);
        let mut spent = utxo(&source, 0);
        spent.spent = true;

        let unsigned = build_transaction(
            &[spent, utxo(&source, 1)],
            &[raw.clone(), raw],
            RECIPIENT,
            15_000,
            Network::Testnet,
            None,
        )
        .unwrap();

        assert_eq!(unsigned.inputs.len(), 1);
        assert_eq!(unsigned.inputs[0].output_index, 1);
    }

    #[test]
    fn test_insufficient_funds() {
        let source = funding_tx(SENDER, &[1_000]);
        let result = build_transaction(
            &[utxo(&source, 0)],
            &[serialize(&source)],
            RECIPIENT,
            5_000,
            Network::Testnet,
            None,
        );
        assert_eq!(result, Err(Error::InsufficientFunds { available: 1_000, requested: 5_000 }));

        let result = build_transaction(&[], &[], RECIPIENT, 5_000, Network::Testnet, None);
        assert_eq!(result, Err(Error::InsufficientFunds { available: 0, requested: 5_000 }));
    }

    #[test]
    fn test_fee_guard() {
        let source = funding_tx(SENDER, &[100_000]);
        let raw = serialize(&source);

        let rejected = build_transaction(
            &[utxo(&source, 0)],
            &[raw.clone()],
            RECIPIENT,
            50_000,
            Network::Testnet,
            Some(10_000),
        );
        assert!(matches!(rejected, Err(Error::Validation(_))));

        let accepted = build_transaction(
            &[utxo(&source, 0)],
            &[raw],
            RECIPIENT,
            95_000,
            Network::Testnet,
            Some(10_000),
        );
        assert!(accepted.is_ok());
    }

    #[test]
    fn test_source_bytes_must_match_txid() {
        let source = funding_tx(SENDER, &[100_000]);
        let other = funding_tx(SENDER, &[100_001]);

        let result = build_transaction(
            &[utxo(&source, 0)],
            &[serialize(&other)],
            RECIPIENT,
            50_000,
            Network::Testnet,
            None,
        );
        assert!(matches!(result, Err(Error::Transaction(_))));
    }

    #[test]
    fn test_reported_value_must_match() {
        let source = funding_tx(SENDER, &[100_000]);
        let mut lying = utxo(&source, 0);
        lying.value_sats = 200_000;

        let result = build_transaction(
            &[lying],
            &[serialize(&source)],
            RECIPIENT,
            150_000,
            Network::Testnet,
            None,
        );
        assert!(matches!(result, Err(Error::Transaction(_))));
    }

    #[test]
    fn test_invalid_recipient() {
        let source = funding_tx(SENDER, &[100_000]);
        let result = build_transaction(
            &[utxo(&source, 0)],
            &[serialize(&source)],
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
            50_000,
            Network::Testnet,
            None,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_implicit_fee_never_underflows() {
        let source = funding_tx(SENDER, &[100_000]);
        let mut unsigned = build_transaction(
            &[utxo(&source, 0)],
            &[serialize(&source)],
            RECIPIENT,
            100_000,
            Network::Testnet,
            None,
        )
        .unwrap();
        assert_eq!(unsigned.implicit_fee_sats(), 0);

        unsigned.outputs[0].value_sats = 150_000;
        assert_eq!(unsigned.implicit_fee_sats(), 0);
    }
}
