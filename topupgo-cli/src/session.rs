//! Wallet session backed by a local private key.
//!
//! The key's provider is bound to a single RPC endpoint, so the session can
//! only ever be on that endpoint's chain. It has no checkout widget; the
//! funding view fallback prints funding instructions instead.

use async_trait::async_trait;
use topupgo::chain::{Account, ChainId};
use topupgo::profile::truncate_address;
use topupgo::session::{SessionError, UserInfo, WalletSession};

/// Session for a locally held key.
#[derive(Debug, Clone)]
pub struct LocalSession {
    account: Account,
    user: Option<UserInfo>,
    funding_token: String,
}

impl LocalSession {
    /// Creates a session for `account`, funded with `funding_token`.
    pub fn new(account: Account, user: Option<UserInfo>, funding_token: impl Into<String>) -> Self {
        Self {
            account,
            user,
            funding_token: funding_token.into(),
        }
    }
}

#[async_trait]
impl WalletSession for LocalSession {
    fn account(&self) -> Option<Account> {
        Some(self.account)
    }

    fn user_info(&self) -> Option<UserInfo> {
        self.user.clone()
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), SessionError> {
        if self.account.is_on(chain_id) {
            return Ok(());
        }
        Err(SessionError::ChainSwitch {
            chain_id,
            reason: format!(
                "RPC endpoint is fixed to chain {}",
                self.account.chain_id
            ),
        })
    }

    fn show_wallet_ui(&self, path: &str) -> Result<(), SessionError> {
        tracing::info!(
            path,
            address = %self.account.address,
            short = %truncate_address(&self.account.address),
            token = %self.funding_token,
            chain_id = self.account.chain_id,
            "Send funds to this address to top up"
        );
        Ok(())
    }
}
