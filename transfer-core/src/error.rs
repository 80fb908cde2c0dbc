//! Error types for the transfer engine

use thiserror::Error;

/// Custom error type for transfer-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport or HTTP failure talking to a chain endpoint
    #[error("Network error: {0}")]
    Network(String),

    /// Referenced transaction, account or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The network refused the signed transaction
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Gas estimation failed, the call would most likely revert
    #[error("Gas estimation error: {0}")]
    Estimation(String),

    /// Signing key does not correspond to the claimed sender address
    #[error("Private key does not match sender address {address}: derived {derived}")]
    AddressKeyMismatch { address: String, derived: String },

    /// Request-level validation failure
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Spendable outputs do not cover the requested amount
    #[error("Insufficient funds: available {available} sats, requested {requested} sats")]
    InsufficientFunds { available: u64, requested: u64 },

    /// The transaction was mined but its execution failed
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Another transaction is still pending on this engine
    #[error("A transaction is already in flight")]
    Busy,

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Result type for transfer-core operations
pub type Result<T> = std::result::Result<T, Error>;
