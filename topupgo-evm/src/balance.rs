//! Aggregate stablecoin balance across all backing contracts.
//!
//! [`BalanceAggregator`] sums the connected account's balance over every
//! configured contract and publishes the result as a [`BalanceView`] on a
//! watch channel. The previous amount stays visible while a refresh runs.
//! Each refresh takes a generation number at start; a refresh that finishes
//! after a newer one has started is discarded.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use topupgo::amount::format_usd;
use topupgo::chain::Account;
use topupgo::config::StablecoinConfig;
use topupgo::retry::RetryPolicy;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::{ConfigError, LedgerError};
use crate::ledger::TokenLedger;

/// Advisory shown when balances could not be read.
pub const BALANCE_ADVISORY: &str = "Failed to fetch balance.";

/// Default interval between periodic refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval [`BalanceAggregator::run`] will poll at.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the balance display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    /// Aggregate in smallest units; `None` until the first load completes.
    pub amount: Option<U256>,
    /// Token decimals, for formatting.
    pub decimals: u8,
    /// A refresh is in flight.
    pub loading: bool,
    /// Non-fatal problem from the last refresh.
    pub advisory: Option<String>,
}

impl BalanceView {
    const fn initial(decimals: u8) -> Self {
        Self {
            amount: None,
            decimals,
            loading: false,
            advisory: None,
        }
    }

    /// The amount as `$X.XX`, or `None` while nothing has loaded yet.
    #[must_use]
    pub fn display(&self) -> Option<String> {
        self.amount.map(|amount| format_usd(amount, self.decimals))
    }
}

impl fmt::Display for BalanceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display() {
            Some(amount) => f.write_str(&amount),
            None => f.write_str("Loading..."),
        }
    }
}

/// Cloneable handle that asks a running aggregator to refresh.
///
/// A trigger fired while a refresh is already running is remembered and
/// causes one more refresh afterwards.
#[derive(Debug, Clone, Default)]
pub struct RefreshTrigger(Arc<Notify>);

impl RefreshTrigger {
    /// Creates an unconnected trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a refresh.
    pub fn trigger(&self) {
        self.0.notify_one();
    }

    async fn notified(&self) {
        self.0.notified().await;
    }
}

/// Reads one contract balance, retrying transient failures per `retry`.
pub(crate) async fn read_balance<L: TokenLedger>(
    ledger: &L,
    retry: RetryPolicy,
    token: Address,
    owner: Address,
) -> Result<U256, LedgerError> {
    retry
        .run(|| ledger.balance_of(token, owner), LedgerError::is_transient)
        .await
}

/// Sums balances across the backing contracts of a stablecoin.
#[derive(Debug)]
pub struct BalanceAggregator<L> {
    ledger: L,
    config: StablecoinConfig,
    retry: RetryPolicy,
    generation: AtomicU64,
    view: watch::Sender<BalanceView>,
}

impl<L: TokenLedger> BalanceAggregator<L> {
    /// Creates an aggregator with the default balance-read retry policy.
    pub fn new(ledger: L, config: StablecoinConfig) -> Self {
        let view = watch::Sender::new(BalanceView::initial(config.decimals));
        Self {
            ledger,
            config,
            retry: RetryPolicy::BALANCE_READ,
            generation: AtomicU64::new(0),
            view,
        }
    }

    /// Replaces the retry policy for balance reads.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribes to balance view updates.
    pub fn subscribe(&self) -> watch::Receiver<BalanceView> {
        self.view.subscribe()
    }

    /// The stablecoin being aggregated.
    pub const fn config(&self) -> &StablecoinConfig {
        &self.config
    }

    /// The current balance view.
    pub fn current(&self) -> BalanceView {
        self.view.borrow().clone()
    }

    /// Sums `account`'s balance over all configured contracts.
    ///
    /// Any chain other than the configured one yields zero without touching
    /// the ledger.
    ///
    /// # Errors
    ///
    /// Returns the ledger error of the first contract that could not be read
    /// after retries.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.balance.aggregate", skip(self), err)
    )]
    pub async fn aggregate(&self, account: &Account) -> Result<U256, LedgerError> {
        if !self.config.supports_chain(account.chain_id) {
            tracing::debug!(chain_id = account.chain_id, "Unsupported chain, balance is zero");
            return Ok(U256::ZERO);
        }
        let mut total = U256::ZERO;
        for contract in &self.config.contracts {
            let balance =
                read_balance(&self.ledger, self.retry, contract.address, account.address).await?;
            tracing::trace!(token = %contract.label, %balance, "Read balance");
            total = total.saturating_add(balance);
        }
        Ok(total)
    }

    /// Recomputes the aggregate for `account` and publishes it.
    ///
    /// Returns `false` if a newer refresh started in the meantime, in which
    /// case the result is dropped. `None` clears the view.
    pub async fn refresh(&self, account: Option<Account>) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(account) = account else {
            self.view
                .send_replace(BalanceView::initial(self.config.decimals));
            return true;
        };

        self.view.send_modify(|view| view.loading = true);
        let result = self.aggregate(&account).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Balance refresh superseded, discarding result");
            return false;
        }

        match result {
            Ok(total) => self.view.send_modify(|view| {
                view.amount = Some(total);
                view.loading = false;
                view.advisory = None;
            }),
            Err(err) => {
                tracing::warn!(error = %err, "Balance refresh failed");
                self.view.send_modify(|view| {
                    view.amount.get_or_insert(U256::ZERO);
                    view.loading = false;
                    view.advisory = Some(BALANCE_ADVISORY.to_owned());
                });
            }
        }
        true
    }

    /// Checks on-chain `decimals()` of every configured contract against the
    /// configured value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DecimalsMismatch`] for the first contract that
    /// disagrees, or the ledger error if a read fails.
    pub async fn verify_decimals(&self) -> Result<(), ConfigError> {
        for contract in &self.config.contracts {
            let actual = self.ledger.decimals(contract.address).await?;
            if actual != self.config.decimals {
                return Err(ConfigError::DecimalsMismatch {
                    token: contract.address,
                    expected: self.config.decimals,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Keeps the view fresh until `cancel` fires.
    ///
    /// Refreshes immediately, then every `interval`, whenever `accounts`
    /// changes, and whenever `trigger` fires. An account change during a
    /// refresh abandons that refresh and starts over with the new account.
    /// Returns when cancelled or when the account sender is dropped.
    /// Intervals shorter than [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub async fn run(
        &self,
        mut accounts: watch::Receiver<Option<Account>>,
        trigger: RefreshTrigger,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let account = *accounts.borrow_and_update();
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = self.refresh(account) => {}
                changed = accounts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                () = trigger.notified() => {}
                changed = accounts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Balance refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{USDC_POLYGON_BRIDGED, USDC_POLYGON_NATIVE, polygon_usdc};
    use crate::testing::FakeLedger;
    use alloy_primitives::address;

    const OWNER: Address = address!("00000000000000000000000000000000000000aa");
    const OTHER: Address = address!("00000000000000000000000000000000000000bb");

    fn aggregator(ledger: FakeLedger) -> BalanceAggregator<Arc<FakeLedger>> {
        BalanceAggregator::new(Arc::new(ledger), polygon_usdc())
    }

    fn ledger_with(native: u64, bridged: u64) -> FakeLedger {
        FakeLedger::new()
            .with_balance(USDC_POLYGON_NATIVE, OWNER, native)
            .with_balance(USDC_POLYGON_BRIDGED, OWNER, bridged)
    }

    #[tokio::test]
    async fn test_sums_both_contracts() {
        let agg = aggregator(ledger_with(40_000_000, 70_000_000));
        assert!(agg.refresh(Some(Account::new(OWNER, 137))).await);

        let view = agg.current();
        assert_eq!(view.amount, Some(U256::from(110_000_000u64)));
        assert_eq!(view.to_string(), "$110.00");
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_empty_balances_display_zero() {
        let agg = aggregator(ledger_with(0, 0));
        agg.refresh(Some(Account::new(OWNER, 137))).await;
        assert_eq!(agg.current().display().as_deref(), Some("$0.00"));
    }

    #[tokio::test]
    async fn test_other_chain_is_zero_without_reads() {
        let ledger = Arc::new(ledger_with(40_000_000, 70_000_000));
        let agg = BalanceAggregator::new(Arc::clone(&ledger), polygon_usdc());
        agg.refresh(Some(Account::new(OWNER, 1))).await;

        let view = agg.current();
        assert_eq!(view.display().as_deref(), Some("$0.00"));
        assert_eq!(view.advisory, None);
        assert_eq!(ledger.reads(), 0);
    }

    #[tokio::test]
    async fn test_shows_loading_before_first_load() {
        let agg = aggregator(ledger_with(1, 1));
        assert_eq!(agg.current().to_string(), "Loading...");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_read_is_retried_once() {
        let ledger = ledger_with(1_000_000, 0);
        ledger.fail_next_reads(&["HTTP error 429 with body: Too Many Requests"]);
        let agg = aggregator(ledger);
        let started = Instant::now();

        agg.refresh(Some(Account::new(OWNER, 137))).await;

        let view = agg.current();
        assert_eq!(view.display().as_deref(), Some("$1.00"));
        assert_eq!(view.advisory, None);
        assert!(started.elapsed() >= Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retry_on_first_load_falls_back_to_zero() {
        let ledger = ledger_with(1_000_000, 0);
        ledger.fail_next_reads(&["HTTP error 429", "HTTP error 429"]);
        let agg = aggregator(ledger);

        agg.refresh(Some(Account::new(OWNER, 137))).await;

        let view = agg.current();
        assert_eq!(view.display().as_deref(), Some("$0.00"));
        assert_eq!(view.advisory.as_deref(), Some(BALANCE_ADVISORY));
    }

    #[tokio::test]
    async fn test_failure_after_success_keeps_previous_amount() {
        let ledger = Arc::new(ledger_with(5_000_000, 0));
        let agg = BalanceAggregator::new(Arc::clone(&ledger), polygon_usdc());
        let account = Account::new(OWNER, 137);
        agg.refresh(Some(account)).await;

        ledger.fail_next_reads(&["connection refused"]);
        agg.refresh(Some(account)).await;

        let view = agg.current();
        assert_eq!(view.display().as_deref(), Some("$5.00"));
        assert_eq!(view.advisory.as_deref(), Some(BALANCE_ADVISORY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_amount_visible_while_refreshing() {
        let ledger = Arc::new(ledger_with(5_000_000, 0));
        let agg = BalanceAggregator::new(Arc::clone(&ledger), polygon_usdc());
        let account = Account::new(OWNER, 137);
        agg.refresh(Some(account)).await;

        ledger.delay_reads_for(OWNER, Duration::from_secs(5));
        ledger.set_balance(USDC_POLYGON_NATIVE, OWNER, 9_000_000);
        let probe = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            agg.current()
        };
        let (_, during) = tokio::join!(agg.refresh(Some(account)), probe);

        assert!(during.loading);
        assert_eq!(during.display().as_deref(), Some("$5.00"));
        assert_eq!(agg.current().display().as_deref(), Some("$9.00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_refresh_is_discarded() {
        let ledger = Arc::new(
            ledger_with(1_000_000, 0).with_balance(USDC_POLYGON_NATIVE, OTHER, 2_000_000),
        );
        ledger.delay_reads_for(OWNER, Duration::from_secs(10));
        let agg = BalanceAggregator::new(Arc::clone(&ledger), polygon_usdc());

        let slow = agg.refresh(Some(Account::new(OWNER, 137)));
        let fast = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            agg.refresh(Some(Account::new(OTHER, 137))).await
        };
        let (slow_applied, fast_applied) = tokio::join!(slow, fast);

        assert!(!slow_applied);
        assert!(fast_applied);
        assert_eq!(agg.current().display().as_deref(), Some("$2.00"));
    }

    #[tokio::test]
    async fn test_verify_decimals_detects_mismatch() {
        let agg = aggregator(FakeLedger::new());
        assert!(agg.verify_decimals().await.is_ok());

        let agg = aggregator(FakeLedger::new().with_decimals(18));
        assert!(matches!(
            agg.verify_decimals().await,
            Err(ConfigError::DecimalsMismatch {
                expected: 6,
                actual: 18,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_trigger_and_account_change() {
        let ledger = Arc::new(
            ledger_with(1_000_000, 0).with_balance(USDC_POLYGON_NATIVE, OTHER, 7_000_000),
        );
        let agg = Arc::new(BalanceAggregator::new(Arc::clone(&ledger), polygon_usdc()));
        let (accounts_tx, accounts_rx) = watch::channel(Some(Account::new(OWNER, 137)));
        let trigger = RefreshTrigger::new();
        let cancel = CancellationToken::new();
        let mut view = agg.subscribe();

        let task = tokio::spawn({
            let agg = Arc::clone(&agg);
            let trigger = trigger.clone();
            let cancel = cancel.clone();
            async move {
                agg.run(accounts_rx, trigger, DEFAULT_REFRESH_INTERVAL, cancel)
                    .await;
            }
        });

        view.wait_for(|v| v.amount == Some(U256::from(1_000_000u64)))
            .await
            .unwrap();

        ledger.set_balance(USDC_POLYGON_NATIVE, OWNER, 3_000_000);
        trigger.trigger();
        view.wait_for(|v| v.amount == Some(U256::from(3_000_000u64)))
            .await
            .unwrap();

        accounts_tx.send_replace(Some(Account::new(OTHER, 137)));
        view.wait_for(|v| v.amount == Some(U256::from(7_000_000u64)))
            .await
            .unwrap();

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_zero_interval_is_clamped() {
        let agg = Arc::new(aggregator(ledger_with(1_000_000, 0)));
        let (_accounts_tx, accounts_rx) = watch::channel(Some(Account::new(OWNER, 137)));
        let trigger = RefreshTrigger::new();
        let cancel = CancellationToken::new();
        let mut view = agg.subscribe();

        let task = tokio::spawn({
            let agg = Arc::clone(&agg);
            let cancel = cancel.clone();
            async move {
                agg.run(accounts_rx, trigger, Duration::ZERO, cancel).await;
            }
        });

        view.wait_for(|v| v.amount == Some(U256::from(1_000_000u64)))
            .await
            .unwrap();
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_with_zero_interval_stops_when_cancelled() {
        let agg = aggregator(ledger_with(1, 1));
        let (_accounts_tx, accounts_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        agg.run(accounts_rx, RefreshTrigger::new(), Duration::ZERO, cancel)
            .await;
    }
}
