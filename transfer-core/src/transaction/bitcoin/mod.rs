//! Bitcoin transaction functionality
//!
//! P2PKH transfers on a UTXO chain: unspent outputs and their source
//! transactions come from a block-explorer REST API, the transfer is built
//! and signed locally, and the raw hex is pushed back through the explorer.

mod builder;
mod client;
mod signer;

pub use builder::*;
pub use client::*;
pub use signer::*;
