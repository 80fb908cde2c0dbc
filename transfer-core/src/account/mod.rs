//! Account management functionality
//!
//! Holds the sender identities a front end has imported, so a transfer can
//! be started from an address alone.

mod store;

pub use store::*;
