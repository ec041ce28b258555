//! `topupgo` command-line wallet.
//!
//! # Usage
//!
//! ```bash
//! # Show the aggregate USDC balance of the configured wallet
//! topupgo balance
//!
//! # Pay 12.50 USDC to the user tagged "alice"
//! topupgo send alice 12.50
//!
//! # Keep the balance view running until Ctrl-C
//! RUST_LOG=debug topupgo watch
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `topupgo.toml`)
//! - `RPC_URL` - Override the RPC endpoint
//! - `LOOKUP_URL` - Override the lookup endpoint
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use topupgo::chain::Account;
use topupgo::amount::format_units;
use topupgo::checkout::{CheckoutLauncher, CheckoutOutcome};
use topupgo::notify::TracingNotifier;
use topupgo::profile::{ProfileView, WELCOME_MESSAGE, truncate_address};
use topupgo::recipient::{AddressResolver, RecipientField};
use topupgo::retry::RetryPolicy;
use topupgo_cli::config::{DEFAULT_CONFIG_PATH, TopupConfig};
use topupgo_cli::session::LocalSession;
use topupgo_evm::balance::{BalanceAggregator, BalanceView, RefreshTrigger};
use topupgo_evm::error::ConfigError;
use topupgo_evm::ledger::{AlloyLedger, TokenLedger};
use topupgo_evm::payment::PaymentSubmitter;
use topupgo_http::DepositAddressClient;
use tracing_subscriber::EnvFilter;
use url::Url;

type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Parser)]
#[command(name = "topupgo", version, about = "Stablecoin wallet for TopupGo tags")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the aggregate balance across all backing contracts.
    Balance,
    /// Keep refreshing the balance until interrupted.
    Watch,
    /// Resolve a recipient tag to its deposit address.
    Resolve {
        /// Recipient tag.
        tag: String,
    },
    /// Pay a tagged recipient.
    Send {
        /// Recipient tag.
        tag: String,
        /// Amount in token units, e.g. `12.50`.
        amount: String,
    },
    /// Open the top-up flow.
    Topup,
    /// Show the profile of the configured user.
    Profile,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("topupgo failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = TopupConfig::load_from(&cli.config)?;
    tracing::debug!(rpc_url = %config.rpc_url, lookup_url = %config.lookup_url, "Loaded configuration");

    match cli.command {
        Command::Resolve { tag } => {
            let address = resolver(&config)?.resolve(&tag).await?;
            emit(&address.to_checksum(None))
        }
        Command::Profile => profile(&config),
        Command::Balance => {
            let wallet = Wallet::connect(&config).await?;
            let aggregator = wallet.aggregator(&config);
            if let Err(e) = wallet.verify(&aggregator).await {
                tracing::warn!("Token configuration check failed: {e}");
            }
            aggregator.refresh(Some(wallet.account)).await;
            emit_balance(&aggregator.current())
        }
        Command::Watch => watch_balance(&config).await,
        Command::Send { tag, amount } => send(&config, &tag, &amount).await,
        Command::Topup => {
            let wallet = Wallet::connect(&config).await?;
            let token = config.stablecoin();
            let session = wallet.session(&config);
            let outcome = CheckoutLauncher::new(&token)
                .with_settle_delay(config.settle_delay())
                .with_switch_policy(RetryPolicy::ONCE)
                .open_checkout(&session, &TracingNotifier)
                .await;
            if outcome == CheckoutOutcome::Failed {
                return Err("Failed to open checkout".into());
            }
            Ok(())
        }
    }
}

type Ledger = AlloyLedger<alloy_provider::DynProvider>;

/// The connected local wallet.
struct Wallet {
    ledger: Arc<Ledger>,
    account: Account,
}

impl Wallet {
    async fn connect(config: &TopupConfig) -> Result<Self, BoxError> {
        let key = config
            .signer_key()
            .ok_or("signer_private_key is not set")?;
        let signer: PrivateKeySigner = key.parse().map_err(|e| format!("Invalid signer key: {e}"))?;
        let address = signer.address();
        let rpc_url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| format!("Invalid RPC URL: {e}"))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        let ledger = Arc::new(AlloyLedger::new(provider).with_confirmations(config.confirmations));
        let chain_id = ledger.chain_id().await?;
        tracing::info!(address = %address, chain_id, "Wallet connected");
        tracing::info!("{WELCOME_MESSAGE}");

        Ok(Self {
            ledger,
            account: Account::new(address, chain_id),
        })
    }

    fn aggregator(&self, config: &TopupConfig) -> BalanceAggregator<Arc<Ledger>> {
        BalanceAggregator::new(Arc::clone(&self.ledger), config.stablecoin()).with_retry(config.retry)
    }

    fn session(&self, config: &TopupConfig) -> LocalSession {
        let token = config.stablecoin();
        let funding_token = token
            .find_contract(token.checkout_token)
            .map_or_else(|| token.symbol.clone(), |c| c.label.clone());
        LocalSession::new(self.account, config.user.clone(), funding_token)
    }

    /// Checks that the endpoint and token contracts match the configuration.
    async fn verify(&self, aggregator: &BalanceAggregator<Arc<Ledger>>) -> Result<(), ConfigError> {
        let expected = aggregator.config().chain_id;
        if !self.account.is_on(expected) {
            return Err(ConfigError::ChainMismatch {
                expected,
                actual: self.account.chain_id,
            });
        }
        aggregator.verify_decimals().await
    }
}

fn resolver(config: &TopupConfig) -> Result<DepositAddressClient, BoxError> {
    let mut client = DepositAddressClient::try_from(config.lookup_url.as_str())?;
    if let Some(timeout) = config.lookup_timeout() {
        client = client.with_timeout(timeout);
    }
    Ok(client)
}

fn profile(config: &TopupConfig) -> Result<(), BoxError> {
    let view = config
        .user
        .as_ref()
        .map(ProfileView::from)
        .unwrap_or_default();
    emit(&format!("Name:     {}", view.name))?;
    emit(&format!("Email:    {}", view.email))?;
    emit(&format!("Username: @{}", view.username))?;
    emit(&format!("ID:       {}", view.short_id))?;
    if let Some(key) = config.signer_key() {
        let signer: PrivateKeySigner = key.parse().map_err(|e| format!("Invalid signer key: {e}"))?;
        emit(&format!("Address:  {}", truncate_address(&signer.address())))?;
    }
    Ok(())
}

/// A balance aggregator running in the background.
struct BalanceLoop {
    view: watch::Receiver<BalanceView>,
    trigger: RefreshTrigger,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    _accounts: watch::Sender<Option<Account>>,
}

impl BalanceLoop {
    fn spawn(wallet: &Wallet, config: &TopupConfig) -> Self {
        let aggregator = wallet.aggregator(config);
        let (accounts_tx, accounts_rx) = watch::channel(Some(wallet.account));
        let trigger = RefreshTrigger::new();
        let cancel = CancellationToken::new();
        let view = aggregator.subscribe();

        let task = tokio::spawn({
            let trigger = trigger.clone();
            let cancel = cancel.clone();
            let interval = config.refresh_interval();
            async move {
                aggregator.run(accounts_rx, trigger, interval, cancel).await;
            }
        });

        Self {
            view,
            trigger,
            cancel,
            task,
            _accounts: accounts_tx,
        }
    }

    async fn stop(self) -> Result<(), BoxError> {
        self.cancel.cancel();
        self.task.await?;
        Ok(())
    }
}

async fn watch_balance(config: &TopupConfig) -> Result<(), BoxError> {
    let wallet = Wallet::connect(config).await?;
    let mut balance = BalanceLoop::spawn(&wallet, config);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
            changed = balance.view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = balance.view.borrow_and_update().clone();
                if !snapshot.loading {
                    emit_balance(&snapshot)?;
                }
            }
        }
    }

    balance.stop().await
}

async fn send(config: &TopupConfig, tag: &str, amount: &str) -> Result<(), BoxError> {
    let wallet = Wallet::connect(config).await?;
    let token = config.stablecoin();
    let mut balance = BalanceLoop::spawn(&wallet, config);
    balance
        .view
        .wait_for(|v| v.amount.is_some() && !v.loading)
        .await?;

    let submitter = PaymentSubmitter::new(
        Arc::clone(&wallet.ledger),
        resolver(config)?,
        TracingNotifier,
        token.clone(),
    )
    .on_success({
        let trigger = balance.trigger.clone();
        move |receipt| {
            tracing::info!(
                tx_hash = %receipt.tx_hash,
                token = %receipt.contract.label,
                "Payment succeeded"
            );
            trigger.trigger();
        }
    });

    let mut recipient = RecipientField::with_value(tag);
    let receipt = submitter
        .submit(Some(&wallet.account), &mut recipient, amount)
        .await?;
    let paid = format_units(receipt.amount, token.decimals)?.normalize();
    emit(&format!(
        "Paid {paid} {} to {tag} ({}) in tx {}",
        receipt.contract.label,
        truncate_address(&receipt.recipient),
        receipt.tx_hash
    ))?;

    loop {
        balance.view.changed().await?;
        if !balance.view.borrow_and_update().loading {
            break;
        }
    }
    let snapshot = balance.view.borrow().clone();
    emit_balance(&snapshot)?;
    balance.stop().await
}

fn emit_balance(view: &BalanceView) -> Result<(), BoxError> {
    emit(&format!("Balance: {view} USD"))?;
    if let Some(advisory) = &view.advisory {
        tracing::warn!("{advisory}");
    }
    Ok(())
}

fn emit(line: &str) -> Result<(), BoxError> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}
