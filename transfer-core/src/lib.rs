//! Transfer Core - Bitcoin and Polygon transaction engine
//!
//! This library builds, signs and broadcasts value transfers on a UTXO chain
//! (Bitcoin testnet style, P2PKH) and on an EVM account chain (Polygon,
//! ERC-20 `transfer` calls), and keeps the observable state a wallet front
//! end renders: loading flag, success/failure flags and per-chain history.

pub mod error;
pub mod config;
pub mod crypto;
pub mod account;
pub mod transaction;
pub mod engine;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use engine::{EngineObserver, EngineSnapshot, EngineStatus, TransactionEngine};
pub use error::{Error, Result};
pub use transaction::Chain;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
