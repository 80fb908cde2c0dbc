//! Chain-tagged private key material

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::transaction::Chain;

/// A private key in its textual representation.
///
/// Bitcoin keys are 64-char raw hex or WIF, Polygon keys are raw hex with
/// or without a `0x` prefix. The text is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    secret: String,
    #[zeroize(skip)]
    chain: Chain,
}

impl PrivateKey {
    /// Create a new private key for the given chain
    pub fn new(secret: impl Into<String>, chain: Chain) -> Self {
        Self {
            secret: secret.into().trim().to_string(),
            chain,
        }
    }

    /// Get the textual key. Keep the borrow short.
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }

    /// Get the chain the key belongs to
    pub fn chain(&self) -> Chain {
        self.chain
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("chain", &self.chain)
            .field("secret", &"<redacted>")
            .finish()
    }
}
