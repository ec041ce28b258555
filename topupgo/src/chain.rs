//! EVM chain primitives.
//!
//! Provides the chain identifier used across the payment flow, CAIP-2
//! formatting for the checkout surface, the connected [`Account`], and
//! checksum normalization for addresses coming from outside the process.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// An EIP-155 chain ID (e.g., 137 for Polygon).
pub type ChainId = u64;

/// Formats a chain ID as a CAIP-2 identifier.
///
/// Example: `caip2(137)` returns `"eip155:137"`.
#[must_use]
pub fn caip2(chain_id: ChainId) -> String {
    format!("eip155:{chain_id}")
}

/// The connected user's address together with the chain the wallet is on.
///
/// Supplied by the session collaborator and never mutated by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Connected wallet address.
    pub address: Address,
    /// Currently active chain.
    pub chain_id: ChainId,
}

impl Account {
    /// Creates an account snapshot.
    #[must_use]
    pub const fn new(address: Address, chain_id: ChainId) -> Self {
        Self { address, chain_id }
    }

    /// Returns `true` if the wallet is currently on `chain_id`.
    #[must_use]
    pub const fn is_on(&self, chain_id: ChainId) -> bool {
        self.chain_id == chain_id
    }
}

/// Error returned when an externally supplied address cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressFormatError {
    /// Not a 20-byte hex string.
    #[error("Invalid address {0:?}")]
    Malformed(String),
    /// Mixed-case input whose casing does not match the EIP-55 checksum.
    #[error("Invalid address checksum {0:?}")]
    Checksum(String),
}

/// Parses an address and validates its EIP-55 checksum when it carries one.
///
/// All-lowercase and all-uppercase inputs are accepted as-is; mixed-case input
/// must match the checksum exactly. The returned [`Address`] displays in
/// checksum form.
///
/// # Errors
///
/// Returns [`AddressFormatError`] if the input is not an address or its
/// checksum is wrong.
pub fn normalize_address(raw: &str) -> Result<Address, AddressFormatError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let address: Address = trimmed
        .parse()
        .map_err(|_| AddressFormatError::Malformed(trimmed.to_owned()))?;

    let mixed_case = hex.chars().any(|c| c.is_ascii_lowercase())
        && hex.chars().any(|c| c.is_ascii_uppercase());
    if mixed_case && address.to_checksum(None)[2..] != *hex {
        return Err(AddressFormatError::Checksum(trimmed.to_owned()));
    }
    Ok(address)
}
