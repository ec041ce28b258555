//! Embedded-wallet session collaborator.
//!
//! The wallet SDK owns login, signing, and the optional checkout widget. The
//! core only sees it through [`WalletSession`]. Checkout support is an
//! explicit capability: a session either hands out a [`CheckoutCapable`]
//! object or it does not.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::{Account, ChainId};

/// User record exposed by the wallet login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default, alias = "image", alias = "profile_image")]
    pub profile_image: Option<String>,
    /// Login username, when the provider has one.
    #[serde(default)]
    pub username: Option<String>,
    /// Identifier assigned by the login verifier.
    #[serde(default, alias = "verifier_id")]
    pub verifier_id: Option<String>,
    /// Opaque user id.
    #[serde(default)]
    pub id: Option<String>,
}

/// Options handed to the checkout surface.
///
/// The first entry of `fiat_list` is the default currency; the rest are
/// offered as alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOptions {
    /// CAIP-2 chain identifier, e.g. `"eip155:137"`.
    pub chain_id: String,
    /// Token to buy.
    pub token_address: Address,
    /// Fiat currencies, default first.
    pub fiat_list: Vec<String>,
}

/// Errors reported by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No wallet is connected.
    #[error("Wallet not connected")]
    NotConnected,
    /// Switching the active chain failed.
    #[error("Chain switch to {chain_id} failed: {reason}")]
    ChainSwitch {
        /// Requested chain.
        chain_id: ChainId,
        /// Underlying failure.
        reason: String,
    },
    /// The checkout surface failed to open.
    #[error("Checkout failed: {0}")]
    Checkout(String),
    /// The wallet UI failed to open.
    #[error("Wallet UI failed: {0}")]
    WalletUi(String),
}

/// Checkout capability of an embedded wallet.
#[async_trait]
pub trait CheckoutCapable: Send + Sync {
    /// Opens the checkout surface.
    async fn show_checkout(&self, options: &CheckoutOptions) -> Result<(), SessionError>;
}

/// The connected embedded-wallet session.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Connected account and its active chain, or `None` when logged out.
    fn account(&self) -> Option<Account>;

    /// User record of the logged-in user.
    fn user_info(&self) -> Option<UserInfo>;

    /// Switches the wallet to `chain_id`.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), SessionError>;

    /// The checkout capability, when the wallet has one.
    fn checkout(&self) -> Option<&dyn CheckoutCapable> {
        None
    }

    /// Opens the generic wallet UI at `path` (e.g. `"wallet/funding"`).
    fn show_wallet_ui(&self, path: &str) -> Result<(), SessionError>;
}
