//! Payment submission.
//!
//! [`PaymentSubmitter::submit`] runs the send flow end to end: validate the
//! form, resolve the recipient tag, pick the first backing contract whose
//! balance covers the amount, broadcast the transfer, and wait for it to be
//! mined. Every step reports progress through the [`Notifier`] under the
//! `payment` dedupe key. Only one submission runs at a time.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::{Address, TxHash, U256};
use topupgo::amount::parse_units;
use topupgo::chain::Account;
use topupgo::config::{StablecoinConfig, TokenContract};
use topupgo::error::PaymentError;
use topupgo::notify::{NoticeKind, Notifier};
use topupgo::recipient::{AddressResolver, RECIPIENT_NOT_FOUND, RecipientField, resolve_for_submit};
use topupgo::retry::RetryPolicy;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::balance::read_balance;
use crate::error::{LedgerError, transfer_error, transport_error};
use crate::ledger::TokenLedger;

/// Dedupe key shared by all payment notices.
pub const PAYMENT_NOTICE_KEY: &str = "payment";

/// Shown on a confirmed payment.
pub const PAYMENT_SUCCESSFUL: &str = "Payment successful!";

/// A transfer between submission and confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Checksummed recipient address.
    pub recipient: Address,
    /// Amount in smallest units.
    pub amount: U256,
    /// Contract the transfer is sent on.
    pub contract: TokenContract,
    /// Hash, once the node accepted the transaction.
    pub tx_hash: Option<TxHash>,
    /// Set once the transaction is mined successfully.
    pub confirmed: bool,
}

/// A confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Recipient tag as entered, trimmed.
    pub tag: String,
    /// Resolved recipient address.
    pub recipient: Address,
    /// Amount in smallest units.
    pub amount: U256,
    /// Contract the payment was made from.
    pub contract: TokenContract,
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was mined in.
    pub block_number: Option<u64>,
}

/// Result of scanning the backing contracts for one that covers an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSelection {
    /// First contract whose own balance covers the amount.
    pub chosen: Option<TokenContract>,
    /// Sum of all contract balances.
    pub total: U256,
}

type SuccessCallback = Box<dyn Fn(&PaymentReceipt) + Send + Sync>;

/// Submits stablecoin payments to tagged recipients.
pub struct PaymentSubmitter<L, R, N> {
    ledger: L,
    resolver: R,
    notifier: N,
    config: StablecoinConfig,
    retry: RetryPolicy,
    in_flight: AtomicBool,
    on_success: Option<SuccessCallback>,
}

impl<L, R, N> fmt::Debug for PaymentSubmitter<L, R, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentSubmitter")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<L, R, N> PaymentSubmitter<L, R, N>
where
    L: TokenLedger,
    R: AddressResolver,
    N: Notifier,
{
    /// Creates a submitter.
    pub const fn new(ledger: L, resolver: R, notifier: N, config: StablecoinConfig) -> Self {
        Self {
            ledger,
            resolver,
            notifier,
            config,
            retry: RetryPolicy::ONCE,
            in_flight: AtomicBool::new(false),
            on_success: None,
        }
    }

    /// Retry policy for the balance reads made while selecting a contract.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a callback invoked after every confirmed payment.
    #[must_use]
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PaymentReceipt) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Returns `true` while a submission is running.
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Scans the backing contracts in order and picks the first whose own
    /// balance covers `amount`. Amounts are never split across contracts.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Transport`] if a balance cannot be read.
    pub async fn select_contract(
        &self,
        owner: Address,
        amount: U256,
    ) -> Result<ContractSelection, PaymentError> {
        let mut selection = ContractSelection {
            chosen: None,
            total: U256::ZERO,
        };
        for contract in &self.config.contracts {
            let balance = read_balance(&self.ledger, self.retry, contract.address, owner)
                .await
                .map_err(|e| transport_error(&e))?;
            selection.total = selection.total.saturating_add(balance);
            if selection.chosen.is_none() && balance >= amount {
                selection.chosen = Some(contract.clone());
            }
        }
        Ok(selection)
    }

    /// Sends `amount` (a decimal string) to the recipient in `recipient`.
    ///
    /// Reuses the field's resolution only if it was made for the current tag.
    /// Every failure is also reported through the notifier: a modal for an
    /// unknown recipient, an error toast otherwise.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`] for a missing account, empty tag,
    ///   invalid amount, or a submission already in progress
    /// - [`PaymentError::RecipientNotFound`] if the tag does not resolve
    /// - [`PaymentError::InsufficientBalance`] if no single contract covers
    ///   the amount
    /// - [`PaymentError::Transport`] if balances cannot be read
    /// - [`PaymentError::Transfer`] if the transfer is rejected, reverts, or
    ///   cannot be confirmed
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.payment.submit", skip_all, fields(tag = recipient.tag()), err)
    )]
    pub async fn submit(
        &self,
        account: Option<&Account>,
        recipient: &mut RecipientField,
        amount: &str,
    ) -> Result<PaymentReceipt, PaymentError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PaymentError::Validation(
                "A payment is already in progress.".to_owned(),
            ));
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self.submit_inner(account, recipient, amount).await;
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn submit_inner(
        &self,
        account: Option<&Account>,
        recipient: &mut RecipientField,
        amount: &str,
    ) -> Result<PaymentReceipt, PaymentError> {
        let account = account.ok_or_else(|| PaymentError::Validation("Not connected".to_owned()))?;
        let tag = recipient.tag().to_owned();
        if tag.is_empty() {
            return Err(PaymentError::Validation(
                "Please enter a recipient tag.".to_owned(),
            ));
        }
        let amount = parse_units(amount, self.config.decimals)
            .ok()
            .filter(|units| !units.is_zero())
            .ok_or_else(|| PaymentError::Validation("Please enter a valid amount.".to_owned()))?;

        if recipient.cached_address().is_none() {
            self.progress("Checking recipient tag…");
        }
        let to = resolve_for_submit(recipient, &self.resolver)
            .await
            .map_err(|err| PaymentError::RecipientNotFound {
                tag: tag.clone(),
                reason: err.to_string(),
            })?;

        self.progress("Sending payment…");
        let selection = self.select_contract(account.address, amount).await?;
        let Some(contract) = selection.chosen else {
            return Err(PaymentError::InsufficientBalance {
                available: selection.total,
                decimals: self.config.decimals,
            });
        };
        tracing::info!(
            %tag,
            recipient = %to,
            token = %contract.label,
            %amount,
            "Submitting transfer"
        );

        let mut pending = PendingTransfer {
            recipient: to,
            amount,
            contract,
            tx_hash: None,
            confirmed: false,
        };
        let tx_hash = self
            .ledger
            .submit_transfer(pending.contract.address, to, amount)
            .await
            .map_err(|e| transfer_error(&e, None))?;
        pending.tx_hash = Some(tx_hash);
        tracing::info!(%tx_hash, "Transfer broadcast, awaiting confirmation");

        let receipt = self
            .ledger
            .wait_for_confirmation(tx_hash)
            .await
            .map_err(|e| transfer_error(&e, Some(tx_hash)))?;
        if !receipt.success {
            return Err(transfer_error(
                &LedgerError::TransactionReverted(tx_hash),
                Some(tx_hash),
            ));
        }
        pending.confirmed = true;

        let receipt = PaymentReceipt {
            tag,
            recipient: pending.recipient,
            amount: pending.amount,
            contract: pending.contract,
            tx_hash,
            block_number: receipt.block_number,
        };
        tracing::info!(%tx_hash, block = ?receipt.block_number, "Payment confirmed");
        self.notifier.notify(
            NoticeKind::Success,
            PAYMENT_SUCCESSFUL,
            Some(PAYMENT_NOTICE_KEY),
        );
        self.notifier
            .notify(NoticeKind::Modal, PAYMENT_SUCCESSFUL, None);
        if let Some(callback) = &self.on_success {
            callback(&receipt);
        }
        Ok(receipt)
    }

    fn progress(&self, message: &str) {
        self.notifier
            .notify(NoticeKind::Loading, message, Some(PAYMENT_NOTICE_KEY));
    }

    fn report(&self, err: &PaymentError) {
        tracing::warn!(error = %err, "Payment failed");
        match err {
            PaymentError::RecipientNotFound { .. } => {
                self.notifier
                    .notify(NoticeKind::Dismiss, "", Some(PAYMENT_NOTICE_KEY));
                self.notifier
                    .notify(NoticeKind::Modal, RECIPIENT_NOT_FOUND, None);
            }
            PaymentError::Validation(_) => {
                self.notifier
                    .notify(NoticeKind::Error, &err.user_message(), None);
            }
            _ => {
                self.notifier.notify(
                    NoticeKind::Error,
                    &err.user_message(),
                    Some(PAYMENT_NOTICE_KEY),
                );
            }
        }
    }
}
