//! Error types for on-chain token operations.

use alloy_primitives::{Address, TxHash};
use alloy_provider::PendingTransactionError;
use alloy_transport::TransportError;
use topupgo::error::{FailureSignature, PaymentError};

/// Errors returned by a [`TokenLedger`](crate::ledger::TokenLedger).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// RPC transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Waiting for the transaction receipt failed.
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
    /// The mined transaction has a failed status.
    #[error("Transaction {0} reverted")]
    TransactionReverted(TxHash),
    /// Contract call failed.
    #[error("Contract call failed: {0}")]
    ContractCall(String),
}

impl LedgerError {
    /// Classifies the error. A mined revert is always
    /// [`FailureSignature::Other`]; everything else goes by its text.
    #[must_use]
    pub fn signature(&self) -> FailureSignature {
        match self {
            Self::TransactionReverted(_) => FailureSignature::Other,
            _ => FailureSignature::classify(&self.to_string()),
        }
    }

    /// Returns `true` if a delayed retry of a read may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.signature().is_transient()
    }
}

impl From<alloy_contract::Error> for LedgerError {
    fn from(e: alloy_contract::Error) -> Self {
        match e {
            alloy_contract::Error::UnknownFunction(_)
            | alloy_contract::Error::UnknownSelector(_)
            | alloy_contract::Error::NotADeploymentTransaction
            | alloy_contract::Error::ContractNotDeployed
            | alloy_contract::Error::ZeroData(_, _)
            | alloy_contract::Error::AbiError(_) => Self::ContractCall(e.to_string()),
            alloy_contract::Error::TransportError(e) => Self::Transport(e),
            alloy_contract::Error::PendingTransactionError(e) => Self::PendingTransaction(e),
        }
    }
}

/// A backing contract reports different decimals than configured.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading `decimals()` failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// On-chain decimals differ from the configured value.
    #[error("Token {token} has {actual} decimals, configured {expected}")]
    DecimalsMismatch {
        /// Contract address.
        token: Address,
        /// Configured decimals.
        expected: u8,
        /// Decimals reported on-chain.
        actual: u8,
    },
    /// The RPC endpoint is on a different chain than the token.
    #[error("RPC endpoint is on chain {actual}, token is configured for {expected}")]
    ChainMismatch {
        /// Configured chain.
        expected: u64,
        /// Chain reported by the endpoint.
        actual: u64,
    },
}

/// Maps a failed balance read during submission.
pub(crate) fn transport_error(err: &LedgerError) -> PaymentError {
    PaymentError::transport(err.to_string())
}

/// Maps a failed transfer or confirmation.
pub(crate) fn transfer_error(err: &LedgerError, tx_hash: Option<TxHash>) -> PaymentError {
    PaymentError::Transfer {
        signature: err.signature(),
        message: err.to_string(),
        tx_hash: tx_hash.map(|h| h.to_string()),
    }
}
