//! Token ledger access.
//!
//! [`TokenLedger`] is the seam between the payment flow and the chain: it
//! reads balances and decimals of ERC-20 contracts, submits transfers, and
//! waits for their receipts. [`AlloyLedger`] implements it over any alloy
//! [`Provider`]; tests substitute in-memory ledgers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{PendingTransactionBuilder, Provider};
use topupgo::chain::ChainId;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::contract::IERC20;
use crate::error::LedgerError;

/// Outcome of a mined transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// `false` if the transaction reverted.
    pub success: bool,
}

/// Read and write access to ERC-20 token contracts on one chain.
pub trait TokenLedger: Send + Sync {
    /// Chain the ledger is connected to.
    fn chain_id(&self) -> impl Future<Output = Result<ChainId, LedgerError>> + Send;

    /// Balance of `owner` on `token`, in smallest units.
    fn balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<U256, LedgerError>> + Send;

    /// `decimals()` of `token`.
    fn decimals(&self, token: Address) -> impl Future<Output = Result<u8, LedgerError>> + Send;

    /// Broadcasts `transfer(to, amount)` on `token` and returns the hash as
    /// soon as the node accepts it.
    fn submit_transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Waits until `tx_hash` is mined.
    fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TransferReceipt, LedgerError>> + Send;
}

impl<T: TokenLedger> TokenLedger for Arc<T> {
    fn chain_id(&self) -> impl Future<Output = Result<ChainId, LedgerError>> + Send {
        (**self).chain_id()
    }

    fn balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<U256, LedgerError>> + Send {
        (**self).balance_of(token, owner)
    }

    fn decimals(&self, token: Address) -> impl Future<Output = Result<u8, LedgerError>> + Send {
        (**self).decimals(token)
    }

    fn submit_transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send {
        (**self).submit_transfer(token, to, amount)
    }

    fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TransferReceipt, LedgerError>> + Send {
        (**self).wait_for_confirmation(tx_hash)
    }
}

/// [`TokenLedger`] backed by an alloy provider.
///
/// Transfers are signed by whatever wallet filler the provider carries.
#[derive(Debug, Clone)]
pub struct AlloyLedger<P> {
    provider: P,
    confirmations: u64,
    receipt_timeout: Option<Duration>,
}

impl<P> AlloyLedger<P> {
    /// Wraps `provider`, waiting for one confirmation and no receipt timeout.
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            confirmations: 1,
            receipt_timeout: None,
        }
    }

    /// Sets the number of confirmations to wait for.
    #[must_use]
    pub const fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Bounds the wait for a receipt.
    #[must_use]
    pub const fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = Some(timeout);
        self
    }

    /// The underlying provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider> TokenLedger for AlloyLedger<P> {
    async fn chain_id(&self) -> Result<ChainId, LedgerError> {
        Ok(self.provider.get_chain_id().await?)
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.ledger.balance_of", skip(self), err)
    )]
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        let contract = IERC20::new(token, &self.provider);
        Ok(contract.balanceOf(owner).call().await?)
    }

    async fn decimals(&self, token: Address) -> Result<u8, LedgerError> {
        let contract = IERC20::new(token, &self.provider);
        Ok(contract.decimals().call().await?)
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.ledger.transfer", skip(self), err)
    )]
    async fn submit_transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, LedgerError> {
        let contract = IERC20::new(token, &self.provider);
        let pending = contract.transfer(to, amount).send().await?;
        Ok(*pending.tx_hash())
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.ledger.confirm", skip(self), err)
    )]
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TransferReceipt, LedgerError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(self.receipt_timeout)
            .get_receipt()
            .await?;
        Ok(TransferReceipt {
            tx_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }
}
