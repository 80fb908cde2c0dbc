//! Transaction engine
//!
//! Holds the transfer draft, drives one chain pipeline at a time and keeps
//! the observable state: status, loading flag, result flags and the
//! append-only history of submitted transaction ids per chain.
//!
//! A transfer is validated before anything changes. Only then does the
//! engine enter `Pending`, so a malformed request never shows a spinner.
//! While one transfer is pending every further request is rejected with
//! [`Error::Busy`] and leaves the state untouched. The loading flag is
//! cleared on every exit path, including the awaiting future being dropped.

mod observer;
mod pipeline;
mod state;

pub use observer::*;
pub use pipeline::*;
pub use state::{EngineSnapshot, EngineStatus};

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::account::KeyStore;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::transaction::bitcoin::BitcoinClient;
use crate::transaction::polygon::TokenClient;
use crate::transaction::{
    Chain, ProviderFactory, TransactionDetails, TransactionRecord, TransferRequest,
};
use state::EngineState;

/// Bitcoin + Polygon transfer engine
pub struct TransactionEngine {
    bitcoin_client: Arc<dyn BitcoinClient>,
    polygon_client: Arc<dyn TokenClient>,
    bitcoin: BitcoinPipeline,
    polygon: PolygonPipeline,
    key_store: KeyStore,
    state: RwLock<EngineState>,
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
}

impl TransactionEngine {
    /// Create an engine talking to the endpoints in `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let bitcoin = ProviderFactory::bitcoin_client(&config)?;
        let polygon = ProviderFactory::polygon_client(&config)?;
        Self::with_clients(config, bitcoin, polygon)
    }

    /// Create an engine over caller-supplied chain clients
    pub fn with_clients(
        config: EngineConfig,
        bitcoin_client: Arc<dyn BitcoinClient>,
        polygon_client: Arc<dyn TokenClient>,
    ) -> Result<Self> {
        let bitcoin = BitcoinPipeline::new(bitcoin_client.clone(), &config);
        let polygon = PolygonPipeline::new(polygon_client.clone(), &config)?;
        Ok(Self {
            bitcoin_client,
            polygon_client,
            bitcoin,
            polygon,
            key_store: KeyStore::new(config.bitcoin.network),
            state: RwLock::new(EngineState::default()),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Imported keys
    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Set the sender address and the key that controls it
    pub fn set_sender(&self, address: impl Into<String>, private_key: impl Into<String>) {
        let mut state = self.write_state();
        state.draft.sender_address = Some(address.into());
        state.draft.sender_secret = Some(Zeroizing::new(private_key.into()));
    }

    /// Set the sender to an address previously imported into the key store
    pub fn set_sender_from_store(&self, address: &str, chain: Chain) -> Result<()> {
        let entry = self.key_store.lookup(address, chain)?;
        self.set_sender(entry.address.clone(), entry.private_key.expose_secret());
        Ok(())
    }

    pub fn set_recipient(&self, address: impl Into<String>) {
        self.write_state().draft.recipient_address = Some(address.into());
    }

    /// Amount in BTC for Bitcoin, in token base units for Polygon
    pub fn set_amount(&self, amount: impl Into<String>) {
        self.write_state().draft.amount = Some(amount.into());
    }

    /// Register an observer for state transitions
    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Current state
    pub fn snapshot(&self) -> EngineSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Submitted transaction ids for `chain`, oldest first
    pub fn history(&self, chain: Chain) -> Vec<String> {
        self.snapshot().history(chain).to_vec()
    }

    /// Clear the success and failure flags. Ignored while a transfer is pending.
    pub fn reset_status(&self) -> EngineSnapshot {
        let snapshot = {
            let mut state = self.write_state();
            if state.status == EngineStatus::Pending {
                warn!("Ignoring status reset while a transfer is pending");
                return state.snapshot();
            }
            state.reset();
            state.snapshot()
        };
        self.notify(&snapshot);
        snapshot
    }

    /// Build, sign and submit the drafted transfer on `chain`.
    ///
    /// Returns the settled state. Failures are reported through
    /// `failed`/`last_error`, not as an `Err`.
    pub async fn perform_transaction(&self, chain: Chain) -> EngineSnapshot {
        let request = match self.begin(chain) {
            Ok(request) => request,
            Err(Error::Busy) => {
                warn!(%chain, "Rejected transfer, another transaction is pending");
                return self.snapshot();
            }
            Err(e) => {
                warn!(%chain, error = %e, "Rejected invalid transfer");
                return self.settle(chain, Err(e));
            }
        };

        let mut guard = PendingGuard { engine: self, chain, armed: true };
        let outcome = match chain {
            Chain::Bitcoin => self.bitcoin.submit(&request).await,
            Chain::Polygon => self.polygon.submit(&request).await,
        };
        guard.armed = false;
        self.settle(chain, outcome)
    }

    /// Look up a submitted transaction for display
    pub async fn transaction_details(&self, chain: Chain, tx_id: &str) -> Result<TransactionDetails> {
        match chain {
            Chain::Bitcoin => self.bitcoin_client.transaction_details(tx_id).await,
            Chain::Polygon => self.polygon_client.transaction_details(tx_id).await,
        }
    }

    fn begin(&self, chain: Chain) -> Result<TransferRequest> {
        let (request, snapshot) = {
            let mut state = self.write_state();
            if state.status == EngineStatus::Pending {
                return Err(Error::Busy);
            }
            let request = state.draft.to_request(chain)?;
            state.begin();
            (request, state.snapshot())
        };
        info!(%chain, "Transfer pending");
        self.notify(&snapshot);
        Ok(request)
    }

    fn settle(&self, chain: Chain, outcome: Result<String>) -> EngineSnapshot {
        let snapshot = {
            let mut state = self.write_state();
            match outcome {
                Ok(id) => {
                    info!(%chain, tx_id = %id, "Transfer submitted");
                    state.succeed(TransactionRecord { id, chain });
                }
                Err(e) => {
                    error!(%chain, error = %e, "Transfer failed");
                    state.fail(e.to_string());
                }
            }
            state.snapshot()
        };
        self.notify(&snapshot);
        snapshot
    }

    fn notify(&self, snapshot: &EngineSnapshot) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_state_change(snapshot);
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles the engine as failed if a pending transfer's future is dropped
struct PendingGuard<'a> {
    engine: &'a TransactionEngine,
    chain: Chain,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.settle(
                self.chain,
                Err(Error::Transaction("Transfer abandoned before it settled".to_string())),
            );
        }
    }
}
