//! Polygon network constants and the USDC configuration backed by the native
//! and bridged contracts.

use alloy_primitives::{Address, address};
use topupgo::chain::ChainId;
use topupgo::config::{StablecoinConfig, TokenContract};

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Native (Circle-issued) USDC on Polygon Mainnet.
pub const USDC_POLYGON_NATIVE: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// Bridged USDC (`USDC.e`) on Polygon Mainnet.
pub const USDC_POLYGON_BRIDGED: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

/// Decimals shared by both Polygon USDC contracts.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// USDC on Polygon, native contract first.
///
/// Checkout buys the bridged token.
#[must_use]
pub fn polygon_usdc() -> StablecoinConfig {
    StablecoinConfig {
        symbol: "USDC".to_owned(),
        decimals: DEFAULT_TOKEN_DECIMALS,
        chain_id: POLYGON_MAINNET,
        contracts: vec![
            TokenContract::new(USDC_POLYGON_NATIVE, "USDC"),
            TokenContract::new(USDC_POLYGON_BRIDGED, "USDC.e"),
        ],
        checkout_token: USDC_POLYGON_BRIDGED,
    }
}
