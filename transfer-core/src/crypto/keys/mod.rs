//! Key handling
//!
//! Turns imported private-key text into signing keys for each chain and
//! derives the address a key controls.

pub mod bitcoin;
pub mod polygon;
mod secret;

pub use secret::*;
