//! Top-up checkout launcher.
//!
//! Moves the wallet onto the supported chain, then opens the embedded
//! checkout surface. Wallets without a checkout capability, or whose
//! checkout fails, get the generic funding view instead.

use std::time::Duration;

use alloy_primitives::Address;

use crate::chain::{ChainId, caip2};
use crate::config::StablecoinConfig;
use crate::notify::{NoticeKind, Notifier};
use crate::retry::RetryPolicy;
use crate::session::{CheckoutOptions, SessionError, WalletSession};

/// Wallet UI path of the funding view.
pub const FUNDING_PATH: &str = "wallet/funding";

/// Dedupe key of checkout notices.
pub const CHECKOUT_NOTICE_KEY: &str = "buy-crypto";

/// Shown when neither checkout nor the funding view could be opened.
pub const CHECKOUT_FAILED: &str = "Failed to open checkout. Please try again.";

/// Default wait after a chain switch before opening the checkout.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Which surface ended up open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The checkout surface opened.
    Checkout,
    /// The generic funding view opened instead.
    WalletUi,
    /// Nothing could be opened; a failure notice was emitted.
    Failed,
}

/// Opens the checkout for the supported stablecoin.
#[derive(Debug, Clone)]
pub struct CheckoutLauncher {
    chain_id: ChainId,
    token: Address,
    fiat_list: Vec<String>,
    settle_delay: Duration,
    switch_policy: RetryPolicy,
}

impl CheckoutLauncher {
    /// Creates a launcher for `config`'s chain and checkout token with the
    /// default fiat list (`USD` first, then `INR`).
    #[must_use]
    pub fn new(config: &StablecoinConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            token: config.checkout_token,
            fiat_list: vec!["USD".to_owned(), "INR".to_owned()],
            settle_delay: DEFAULT_SETTLE_DELAY,
            switch_policy: RetryPolicy::ONCE,
        }
    }

    /// Replaces the fiat list. The first entry is the default currency.
    #[must_use]
    pub fn with_fiat_list<I, S>(mut self, fiat_list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fiat_list = fiat_list.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how long to wait after a chain switch.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the retry policy for the chain switch.
    #[must_use]
    pub const fn with_switch_policy(mut self, policy: RetryPolicy) -> Self {
        self.switch_policy = policy;
        self
    }

    /// Options passed to the checkout surface.
    #[must_use]
    pub fn options(&self) -> CheckoutOptions {
        CheckoutOptions {
            chain_id: caip2(self.chain_id),
            token_address: self.token,
            fiat_list: self.fiat_list.clone(),
        }
    }

    /// Opens the checkout, falling back to the funding view once.
    pub async fn open_checkout<S, N>(&self, session: &S, notifier: &N) -> CheckoutOutcome
    where
        S: WalletSession + ?Sized,
        N: Notifier + ?Sized,
    {
        let Some(account) = session.account() else {
            notifier.notify(NoticeKind::Error, &SessionError::NotConnected.to_string(), None);
            return CheckoutOutcome::Failed;
        };

        notifier.notify(
            NoticeKind::Loading,
            "Preparing secure checkout",
            Some(CHECKOUT_NOTICE_KEY),
        );

        let attempt = self.try_checkout(session, account.is_on(self.chain_id)).await;
        match attempt {
            Ok(()) => {
                notifier.notify(NoticeKind::Dismiss, "", Some(CHECKOUT_NOTICE_KEY));
                notifier.notify(NoticeKind::Success, "Checkout opened successfully", None);
                CheckoutOutcome::Checkout
            }
            Err(err) => {
                tracing::warn!(error = %err, "Checkout unavailable, opening funding view");
                notifier.notify(NoticeKind::Dismiss, "", Some(CHECKOUT_NOTICE_KEY));
                match session.show_wallet_ui(FUNDING_PATH) {
                    Ok(()) => CheckoutOutcome::WalletUi,
                    Err(fallback) => {
                        tracing::error!(error = %fallback, "Funding view fallback failed");
                        notifier.notify(NoticeKind::Error, CHECKOUT_FAILED, None);
                        CheckoutOutcome::Failed
                    }
                }
            }
        }
    }

    async fn try_checkout<S>(&self, session: &S, on_chain: bool) -> Result<(), SessionError>
    where
        S: WalletSession + ?Sized,
    {
        if !on_chain {
            self.switch_policy
                .run(|| session.switch_chain(self.chain_id), |_| true)
                .await?;
            tokio::time::sleep(self.settle_delay).await;
        }
        let checkout = session
            .checkout()
            .ok_or_else(|| SessionError::Checkout("checkout capability not available".into()))?;
        checkout.show_checkout(&self.options()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Account;
    use crate::config::TokenContract;
    use crate::notify::MemoryNotifier;
    use crate::session::{CheckoutCapable, UserInfo};
    use alloy_primitives::address;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const BRIDGED: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

    fn config() -> StablecoinConfig {
        StablecoinConfig {
            symbol: "USDC".into(),
            decimals: 6,
            chain_id: 137,
            contracts: vec![TokenContract::new(BRIDGED, "USDC.e")],
            checkout_token: BRIDGED,
        }
    }

    #[derive(Default)]
    struct Widget {
        fail: bool,
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CheckoutCapable for Widget {
        async fn show_checkout(&self, options: &CheckoutOptions) -> Result<(), SessionError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("checkout {}", options.chain_id));
            if self.fail {
                Err(SessionError::Checkout("widget crashed".into()))
            } else {
                Ok(())
            }
        }
    }

    struct FakeSession {
        chain_id: Mutex<ChainId>,
        widget: Option<Widget>,
        wallet_ui_fails: bool,
        log: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn new(chain_id: ChainId, widget: Option<Widget>) -> Self {
            Self {
                chain_id: Mutex::new(chain_id),
                widget,
                wallet_ui_fails: false,
                log: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<String> {
            let mut events = self.log.lock().unwrap().clone();
            if let Some(widget) = &self.widget {
                events.extend(widget.log.lock().unwrap().iter().cloned());
            }
            events
        }
    }

    #[async_trait]
    impl WalletSession for FakeSession {
        fn account(&self) -> Option<Account> {
            Some(Account::new(Address::ZERO, *self.chain_id.lock().unwrap()))
        }

        fn user_info(&self) -> Option<UserInfo> {
            None
        }

        async fn switch_chain(&self, chain_id: ChainId) -> Result<(), SessionError> {
            self.log.lock().unwrap().push(format!("switch {chain_id}"));
            *self.chain_id.lock().unwrap() = chain_id;
            Ok(())
        }

        fn checkout(&self) -> Option<&dyn CheckoutCapable> {
            self.widget.as_ref().map(|w| w as &dyn CheckoutCapable)
        }

        fn show_wallet_ui(&self, path: &str) -> Result<(), SessionError> {
            self.log.lock().unwrap().push(format!("wallet-ui {path}"));
            if self.wallet_ui_fails {
                Err(SessionError::WalletUi("closed".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_options_use_caip2_and_usd_first() {
        let options = CheckoutLauncher::new(&config()).options();
        assert_eq!(options.chain_id, "eip155:137");
        assert_eq!(options.token_address, BRIDGED);
        assert_eq!(options.fiat_list, vec!["USD", "INR"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switches_chain_before_checkout() {
        let session = FakeSession::new(1, Some(Widget::default()));
        let notifier = MemoryNotifier::new();
        let started = tokio::time::Instant::now();

        let outcome = CheckoutLauncher::new(&config())
            .open_checkout(&session, &notifier)
            .await;

        assert_eq!(outcome, CheckoutOutcome::Checkout);
        assert_eq!(session.events(), vec!["switch 137", "checkout eip155:137"]);
        assert!(started.elapsed() >= DEFAULT_SETTLE_DELAY);
        assert!(notifier.contains(NoticeKind::Success, "Checkout opened successfully"));
    }

    #[tokio::test]
    async fn test_no_switch_when_already_on_chain() {
        let session = FakeSession::new(137, Some(Widget::default()));
        let notifier = MemoryNotifier::new();

        CheckoutLauncher::new(&config())
            .open_checkout(&session, &notifier)
            .await;

        assert_eq!(session.events(), vec!["checkout eip155:137"]);
    }

    #[tokio::test]
    async fn test_falls_back_without_capability() {
        let session = FakeSession::new(137, None);
        let notifier = MemoryNotifier::new();

        let outcome = CheckoutLauncher::new(&config())
            .open_checkout(&session, &notifier)
            .await;

        assert_eq!(outcome, CheckoutOutcome::WalletUi);
        assert_eq!(session.events(), vec!["wallet-ui wallet/funding"]);
        assert!(!notifier.contains(NoticeKind::Error, CHECKOUT_FAILED));
    }

    #[tokio::test]
    async fn test_falls_back_when_checkout_fails() {
        let widget = Widget {
            fail: true,
            ..Widget::default()
        };
        let session = FakeSession::new(137, Some(widget));
        let notifier = MemoryNotifier::new();

        let outcome = CheckoutLauncher::new(&config())
            .open_checkout(&session, &notifier)
            .await;

        assert_eq!(outcome, CheckoutOutcome::WalletUi);
    }

    #[tokio::test]
    async fn test_both_failing_notifies_error() {
        let mut session = FakeSession::new(137, None);
        session.wallet_ui_fails = true;
        let notifier = MemoryNotifier::new();

        let outcome = CheckoutLauncher::new(&config())
            .open_checkout(&session, &notifier)
            .await;

        assert_eq!(outcome, CheckoutOutcome::Failed);
        assert!(notifier.contains(NoticeKind::Error, CHECKOUT_FAILED));
    }

    struct Disconnected;

    #[async_trait]
    impl WalletSession for Disconnected {
        fn account(&self) -> Option<Account> {
            None
        }

        fn user_info(&self) -> Option<UserInfo> {
            None
        }

        async fn switch_chain(&self, _chain_id: ChainId) -> Result<(), SessionError> {
            Ok(())
        }

        fn show_wallet_ui(&self, _path: &str) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_disconnected_session_fails_without_fallback() {
        let notifier = MemoryNotifier::new();

        let outcome = CheckoutLauncher::new(&config())
            .open_checkout(&Disconnected, &notifier)
            .await;

        assert_eq!(outcome, CheckoutOutcome::Failed);
        assert!(notifier.contains(NoticeKind::Error, "Wallet not connected"));
    }
}
