//! Polygon transaction functionality
//!
//! ERC-20 token transfers on an EVM account chain. The transfer call is
//! encoded and signed locally with a fixed gas price; gas limit, nonce,
//! submission and the inclusion receipt go through JSON-RPC.

mod builder;
mod client;
mod signer;

pub use builder::*;
pub use client::*;
pub use signer::*;
