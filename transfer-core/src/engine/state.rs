//! Observable engine state

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::keys::PrivateKey;
use crate::error::{Error, Result};
use crate::transaction::{Chain, TransactionRecord, TransferRequest};

/// Where the engine is in the submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// A point-in-time copy of everything a front end renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub status: EngineStatus,
    pub is_loading: bool,
    pub succeeded: bool,
    pub failed: bool,
    /// Reason for the last failure, cleared on the next attempt
    pub last_error: Option<String>,
    /// Bitcoin transaction ids, oldest first
    pub bitcoin_history: Vec<String>,
    /// Polygon transaction hashes, oldest first
    pub polygon_history: Vec<String>,
}

impl EngineSnapshot {
    /// History for one chain
    pub fn history(&self, chain: Chain) -> &[String] {
        match chain {
            Chain::Bitcoin => &self.bitcoin_history,
            Chain::Polygon => &self.polygon_history,
        }
    }
}

/// The request being assembled by the front end
#[derive(Default)]
pub(crate) struct TransferDraft {
    pub sender_address: Option<String>,
    pub sender_secret: Option<Zeroizing<String>>,
    pub recipient_address: Option<String>,
    pub amount: Option<String>,
}

impl TransferDraft {
    /// Turn the draft into a validated request for `chain`
    pub fn to_request(&self, chain: Chain) -> Result<TransferRequest> {
        let sender_address = self
            .sender_address
            .clone()
            .ok_or_else(|| Error::Validation("Sender address is required".to_string()))?;
        let secret = self
            .sender_secret
            .as_ref()
            .ok_or_else(|| Error::Validation("Sender private key is required".to_string()))?;
        let recipient_address = self
            .recipient_address
            .clone()
            .ok_or_else(|| Error::Validation("Recipient address is required".to_string()))?;
        let amount = self
            .amount
            .clone()
            .ok_or_else(|| Error::Validation("Amount is required".to_string()))?;

        let request = TransferRequest {
            chain,
            sender_address,
            sender_private_key: PrivateKey::new(secret.as_str(), chain),
            recipient_address,
            amount,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Mutable engine state behind the engine's lock
pub(crate) struct EngineState {
    pub status: EngineStatus,
    pub is_loading: bool,
    pub succeeded: bool,
    pub failed: bool,
    pub last_error: Option<String>,
    pub draft: TransferDraft,
    bitcoin_history: Vec<TransactionRecord>,
    polygon_history: Vec<TransactionRecord>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status: EngineStatus::Idle,
            is_loading: false,
            succeeded: false,
            failed: false,
            last_error: None,
            draft: TransferDraft::default(),
            bitcoin_history: Vec::new(),
            polygon_history: Vec::new(),
        }
    }
}

impl EngineState {
    /// Enter `Pending`
    pub fn begin(&mut self) {
        self.status = EngineStatus::Pending;
        self.is_loading = true;
        self.succeeded = false;
        self.failed = false;
        self.last_error = None;
    }

    /// Record a submitted transaction and enter `Succeeded`
    pub fn succeed(&mut self, record: TransactionRecord) {
        match record.chain {
            Chain::Bitcoin => self.bitcoin_history.push(record),
            Chain::Polygon => self.polygon_history.push(record),
        }
        self.status = EngineStatus::Succeeded;
        self.succeeded = true;
        self.failed = false;
        self.last_error = None;
        self.is_loading = false;
    }

    /// Enter `Failed`; history is untouched
    pub fn fail(&mut self, reason: String) {
        self.status = EngineStatus::Failed;
        self.succeeded = false;
        self.failed = true;
        self.last_error = Some(reason);
        self.is_loading = false;
    }

    /// Clear the result flags
    pub fn reset(&mut self) {
        self.status = EngineStatus::Idle;
        self.is_loading = false;
        self.succeeded = false;
        self.failed = false;
        self.last_error = None;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            status: self.status,
            is_loading: self.is_loading,
            succeeded: self.succeeded,
            failed: self.failed,
            last_error: self.last_error.clone(),
            bitcoin_history: self.bitcoin_history.iter().map(|r| r.id.clone()).collect(),
            polygon_history: self.polygon_history.iter().map(|r| r.id.clone()).collect(),
        }
    }
}
