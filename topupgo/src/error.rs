//! Error types for the payment flow.
//!
//! [`PaymentError`] is the taxonomy surfaced by the payment submitter.
//! [`ResolveError`] is returned by address resolvers. [`FailureSignature`]
//! recognizes the handful of RPC failure messages that get a dedicated
//! user-facing message or a retry.

use alloy_primitives::U256;

use crate::amount::format_usd;

/// Ways an HTTP 429 status shows up in transport error text. A bare `429`
/// is not enough; it also occurs inside hashes and amounts.
const RATE_LIMIT_STATUS: &[&str] = &[
    "http error 429",
    "status 429",
    "status code 429",
    "status: 429",
    "code 429",
    "code: 429",
    "429 too many",
];

/// Known shapes of RPC and wallet failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignature {
    /// The node rejected the call with HTTP 429 / "Too Many Requests".
    RateLimited,
    /// The token contract reverted because the sender balance is too low.
    BalanceRevert,
    /// A call reverted without returning a reason.
    RevertWithoutReason,
    /// Anything else.
    Other,
}

impl FailureSignature {
    /// Classifies a failure by its message text.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("too many requests")
            || RATE_LIMIT_STATUS.iter().any(|p| lower.contains(p))
        {
            Self::RateLimited
        } else if lower.contains("transfer amount exceeds balance") {
            Self::BalanceRevert
        } else if lower.contains("missing revert data")
            || lower.contains("reverted without a reason")
            || lower.trim_end().ends_with("execution reverted")
        {
            Self::RevertWithoutReason
        } else {
            Self::Other
        }
    }

    /// Returns `true` for failures worth a single delayed retry on reads.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::RevertWithoutReason)
    }
}

/// Errors returned by an [`AddressResolver`](crate::recipient::AddressResolver).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The tag was empty after trimming; no lookup was issued.
    #[error("Recipient tag is empty")]
    EmptyTag,
    /// The lookup answered but did not yield a usable address.
    #[error("No deposit address for {tag:?}: {reason}")]
    NotFound {
        /// The tag that was looked up.
        tag: String,
        /// Server message or local reason.
        reason: String,
    },
    /// The lookup could not be completed.
    #[error("Lookup for {tag:?} failed: {reason}")]
    Transport {
        /// The tag that was looked up.
        tag: String,
        /// Transport failure description.
        reason: String,
    },
}

/// Errors surfaced by the payment submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    /// Bad local input; nothing was sent over the network.
    #[error("{0}")]
    Validation(String),

    /// The recipient tag could not be resolved to an address.
    #[error("Recipient {tag:?} not found: {reason}")]
    RecipientNotFound {
        /// The tag as entered (trimmed).
        tag: String,
        /// Why resolution failed.
        reason: String,
    },

    /// No single backing contract holds the requested amount.
    #[error("Insufficient balance: {available} units available across all contracts")]
    InsufficientBalance {
        /// Total across all backing contracts, in smallest units.
        available: U256,
        /// Token decimals, for display.
        decimals: u8,
    },

    /// RPC transport failure while reading balances or submitting.
    #[error("Transport error: {message}")]
    Transport {
        /// Recognized failure shape.
        signature: FailureSignature,
        /// Underlying error text.
        message: String,
    },

    /// The transfer was rejected, reverted, or could not be confirmed.
    #[error("Transfer failed: {message}")]
    Transfer {
        /// Recognized failure shape.
        signature: FailureSignature,
        /// Underlying error text.
        message: String,
        /// Transaction hash, if the transfer was broadcast.
        tx_hash: Option<String>,
    },
}

impl PaymentError {
    /// Builds a transport error, classifying the message.
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Transport {
            signature: FailureSignature::classify(&message),
            message,
        }
    }

    /// Builds a transfer error, classifying the message.
    pub fn transfer(message: impl Into<String>, tx_hash: Option<String>) -> Self {
        let message = message.into();
        Self::Transfer {
            signature: FailureSignature::classify(&message),
            message,
            tx_hash,
        }
    }

    /// Returns the message shown to the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::RecipientNotFound { .. } => "This recipient was not found".to_owned(),
            Self::InsufficientBalance {
                available,
                decimals,
            } => {
                if available.is_zero() {
                    "Insufficient USDC balance. You have $0.00.".to_owned()
                } else {
                    format!(
                        "Insufficient USDC balance. You have {} available.",
                        format_usd(*available, *decimals)
                    )
                }
            }
            Self::Transport { signature, .. } | Self::Transfer { signature, .. } => {
                match signature {
                    FailureSignature::RateLimited => {
                        "Too many requests. Please wait a moment and try again.".to_owned()
                    }
                    FailureSignature::BalanceRevert => {
                        "Insufficient USDC balance. Check your available balance.".to_owned()
                    }
                    FailureSignature::RevertWithoutReason | FailureSignature::Other => {
                        "Payment failed".to_owned()
                    }
                }
            }
        }
    }

    /// Returns `true` if the error is presented as a blocking modal.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::RecipientNotFound { .. })
    }
}
