//! Token configuration for the payment flow.
//!
//! A single logical stablecoin is backed by several physical contracts on one
//! chain. The order of [`StablecoinConfig::contracts`] is significant: it is
//! the order balances are inspected in when choosing a contract to pay from.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;

/// A deployed token contract backing the stablecoin.
///
/// # Example
///
/// ```rust
/// use alloy_primitives::address;
/// use topupgo::config::TokenContract;
///
/// let bridged = TokenContract::new(
///     address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
///     "USDC.e",
/// );
/// assert_eq!(bridged.label, "USDC.e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenContract {
    /// Contract address.
    pub address: Address,
    /// Short label for logs and receipts (e.g., `"USDC.e"`).
    pub label: String,
}

impl TokenContract {
    /// Creates a token contract entry.
    pub fn new(address: Address, label: impl Into<String>) -> Self {
        Self {
            address,
            label: label.into(),
        }
    }
}

/// The known configuration of the supported stablecoin.
///
/// Every contract listed here must expose the same `decimals` value; the
/// aggregator and submitter never query decimals per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StablecoinConfig {
    /// Display symbol (e.g., `"USDC"`).
    pub symbol: String,
    /// Decimal places shared by all backing contracts.
    pub decimals: u8,
    /// The single chain the token is supported on.
    pub chain_id: ChainId,
    /// Backing contracts, in selection order.
    pub contracts: Vec<TokenContract>,
    /// Contract handed to the checkout surface when topping up.
    pub checkout_token: Address,
}

impl StablecoinConfig {
    /// Finds a backing contract by address.
    #[must_use]
    pub fn find_contract(&self, address: Address) -> Option<&TokenContract> {
        self.contracts.iter().find(|c| c.address == address)
    }

    /// Returns `true` if `chain_id` is the supported chain.
    #[must_use]
    pub const fn supports_chain(&self, chain_id: ChainId) -> bool {
        self.chain_id == chain_id
    }
}
