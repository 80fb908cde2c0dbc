//! Cryptographic primitives and operations
//!
//! This module provides the key parsing and address derivation the
//! signers and the key store rely on.

pub mod keys;

pub use keys::*;
