//! Transaction functionality
//!
//! This module provides functionality for creating, signing, and broadcasting
//! transfers on the supported chains.

pub mod types;
pub mod bitcoin;
pub mod polygon;
pub mod provider;

pub use types::*;
pub use provider::*;
