//! ERC-20 `transfer` call assembly

use ethers::abi::AbiEncode;
use ethers::contract::abigen;
use ethers::types::{Address, Bytes, TransactionRequest, U256};

// Only the call the engine makes. Selector 0xa9059cbb.
abigen!(
    IERC20,
    r#"[
        function transfer(address to, uint256 value) external returns (bool)
    ]"#,
);

/// Convert whole gwei to wei
pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(9)
}

/// A token transfer against a fixed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Token contract the call is sent to
    pub contract: Address,
    /// Token recipient
    pub recipient: Address,
    /// Amount in token base units
    pub amount: U256,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit, set once estimated
    pub gas_limit: Option<U256>,
}

impl TokenTransfer {
    /// Create a transfer with no gas limit yet
    pub fn new(contract: Address, recipient: Address, amount: U256, gas_price: U256) -> Self {
        Self {
            contract,
            recipient,
            amount,
            gas_price,
            gas_limit: None,
        }
    }

    /// Set the gas limit
    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// ABI-encoded `transfer(recipient, amount)` call data
    pub fn calldata(&self) -> Bytes {
        TransferCall {
            to: self.recipient,
            value: self.amount,
        }
        .encode()
        .into()
    }

    /// Legacy transaction request for this call, sent from `from`
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        let request = TransactionRequest::new()
            .from(from)
            .to(self.contract)
            .data(self.calldata())
            .gas_price(self.gas_price);

        match self.gas_limit {
            Some(gas_limit) => request.gas(gas_limit),
            None => request,
        }
    }
}
