//! Command-line wallet configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! rpc_url = "https://polygon-rpc.com"
//! signer_private_key = "$TOPUPGO_SIGNER_KEY"
//! lookup_timeout_secs = 10
//! balance_refresh_secs = 60
//! confirmations = 1
//!
//! [retry]
//! max_attempts = 2
//! backoff_ms = 1500
//!
//! [user]
//! name = "Jane"
//! email = "jane@example.com"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `topupgo.toml`)
//! - `RPC_URL` - Override the RPC endpoint
//! - `LOOKUP_URL` - Override the deposit-address lookup endpoint
//! - Any variable referenced by `$VAR` in the config file

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topupgo::config::StablecoinConfig;
use topupgo::retry::RetryPolicy;
use topupgo::session::UserInfo;
use topupgo_evm::polygon_usdc;
use topupgo_http::DEFAULT_LOOKUP_URL;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "topupgo.toml";

/// Largest token precision whose scale factor fits in a `U256`.
pub const MAX_TOKEN_DECIMALS: u8 = 77;

/// Values that parse but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidConfig {
    /// `balance_refresh_secs` is zero.
    #[error("balance_refresh_secs must be at least 1")]
    ZeroRefreshInterval,
    /// The token override declares more decimals than can be represented.
    #[error("token decimals {0} exceed the maximum of {MAX_TOKEN_DECIMALS}")]
    TokenDecimals(u8),
    /// The token override lists no backing contracts.
    #[error("token override has no contracts")]
    NoContracts,
}

/// Top-level wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupConfig {
    /// HTTP RPC endpoint of the payment chain.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Private key of the local wallet (hex, with or without `0x` prefix).
    /// Supports `$VAR` / `${VAR}` for environment variable expansion.
    #[serde(default)]
    pub signer_private_key: Option<String>,

    /// Deposit-address lookup endpoint.
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,

    /// Timeout for lookup requests, in seconds.
    #[serde(default)]
    pub lookup_timeout_secs: Option<u64>,

    /// Interval between periodic balance refreshes (default: 60).
    #[serde(default = "default_refresh_secs")]
    pub balance_refresh_secs: u64,

    /// Retry policy for balance reads.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Wait after a chain switch before opening checkout (default: 1000).
    #[serde(default = "default_settle_ms")]
    pub chain_settle_ms: u64,

    /// Confirmations to wait for after a transfer (default: 1).
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Stablecoin override; Polygon USDC when absent.
    #[serde(default)]
    pub token: Option<StablecoinConfig>,

    /// Profile shown by `topupgo profile`.
    #[serde(default)]
    pub user: Option<UserInfo>,
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_owned()
}

fn default_lookup_url() -> String {
    DEFAULT_LOOKUP_URL.to_owned()
}

const fn default_refresh_secs() -> u64 {
    60
}

const fn default_settle_ms() -> u64 {
    1_000
}

const fn default_confirmations() -> u64 {
    1
}

impl Default for TopupConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            signer_private_key: None,
            lookup_url: default_lookup_url(),
            lookup_timeout_secs: None,
            balance_refresh_secs: default_refresh_secs(),
            retry: RetryPolicy::default(),
            chain_settle_ms: default_settle_ms(),
            confirmations: default_confirmations(),
            token: None,
            user: None,
        }
    }
}

impl TopupConfig {
    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults. After loading, `$VAR` / `${VAR}`
    /// references are expanded from the process environment, and `RPC_URL`
    /// and `LOOKUP_URL` override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// [`validate`](Self::validate) rejects it.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            String::new()
        };

        let mut config = Self::parse(&content, |name| std::env::var(name).ok())?;

        if let Ok(url) = std::env::var("RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(url) = std::env::var("LOOKUP_URL") {
            config.lookup_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would break the wallet at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] for a zero refresh interval or an unusable
    /// token override.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.balance_refresh_secs == 0 {
            return Err(InvalidConfig::ZeroRefreshInterval);
        }
        if let Some(token) = &self.token {
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(InvalidConfig::TokenDecimals(token.decimals));
            }
            if token.contracts.is_empty() {
                return Err(InvalidConfig::NoContracts);
            }
        }
        Ok(())
    }

    /// Parses TOML, expanding variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the expanded content does not parse.
    pub fn parse<F>(content: &str, lookup: F) -> Result<Self, toml::de::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        toml::from_str(&expand_vars(content, lookup))
    }

    /// The configured stablecoin, Polygon USDC by default.
    #[must_use]
    pub fn stablecoin(&self) -> StablecoinConfig {
        self.token.clone().unwrap_or_else(polygon_usdc)
    }

    /// The signer key, if set and fully expanded.
    #[must_use]
    pub fn signer_key(&self) -> Option<&str> {
        self.signer_private_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.starts_with('$'))
    }

    /// Periodic balance refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.balance_refresh_secs)
    }

    /// Delay after a chain switch.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.chain_settle_ms)
    }

    /// Lookup request timeout.
    #[must_use]
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_secs.map(Duration::from_secs)
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match lookup(&name).filter(|_| !name.is_empty()) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
