//! Deposit-address lookup over HTTP.
//!
//! [`DepositAddressClient`] asks the lookup API for the deposit address of a
//! recipient tag (`GET <base>?username=<tag>`) and implements
//! [`AddressResolver`] for the payment flow.
//!
//! The API answers with `{"status": bool, "data": {"deposit_address": ...},
//! "message": ...}`. Only a reachable API that says `status: true` and returns
//! a valid address counts as found. Network failures are reported as
//! transport errors; every other failure means the tag was not found.

use std::time::Duration;

use alloy_primitives::Address;
use http::HeaderMap;
use http::header::{ACCEPT, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use topupgo::chain::{AddressFormatError, normalize_address};
use topupgo::error::ResolveError;
use topupgo::recipient::AddressResolver;
#[cfg(feature = "telemetry")]
use tracing::instrument;
use url::Url;

/// Production lookup endpoint.
pub const DEFAULT_LOOKUP_URL: &str = "https://app.payairo.com/api/auth/r1/deposit-address/";

/// Reason reported when the API gives none.
pub const DEFAULT_NOT_FOUND: &str = "Could not find deposit address for this username.";

/// Body returned by the lookup API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DepositAddressResponse {
    /// `true` if the lookup succeeded.
    #[serde(default)]
    pub status: bool,
    /// Payload on success.
    #[serde(default)]
    pub data: Option<DepositAddressData>,
    /// Human-readable reason on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of a successful lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DepositAddressData {
    /// Deposit address as returned by the server, not necessarily checksummed.
    #[serde(default)]
    pub deposit_address: Option<String>,
}

/// Errors that can occur while looking up a deposit address.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Failed to read response body.
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The body is not the expected JSON.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// The API answered but has no address for the tag.
    #[error("Deposit address not found: {0}")]
    NotFound(String),
    /// The returned address is malformed.
    #[error(transparent)]
    InvalidAddress(#[from] AddressFormatError),
}

impl LookupError {
    /// Returns `true` if the API could not be reached or read.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::ResponseBodyRead { .. })
    }

    /// Message to attach to a not-found resolution.
    fn not_found_reason(&self) -> String {
        match self {
            Self::NotFound(message) => message.clone(),
            Self::HttpStatus { body, .. } => serde_json::from_str::<DepositAddressResponse>(body)
                .ok()
                .and_then(|r| r.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_NOT_FOUND.to_owned()),
            _ => DEFAULT_NOT_FOUND.to_owned(),
        }
    }

    /// Converts into the resolver error for `tag`.
    #[must_use]
    pub fn into_resolve_error(self, tag: &str) -> ResolveError {
        if self.is_transport() {
            ResolveError::Transport {
                tag: tag.to_owned(),
                reason: self.to_string(),
            }
        } else {
            ResolveError::NotFound {
                tag: tag.to_owned(),
                reason: self.not_found_reason(),
            }
        }
    }
}

/// Client for the deposit-address lookup API.
#[derive(Clone, Debug)]
pub struct DepositAddressClient {
    /// Lookup endpoint; the tag is appended as the `username` query parameter
    url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Extra headers sent with each request
    headers: HeaderMap,
    /// Optional request timeout
    timeout: Option<Duration>,
}

impl DepositAddressClient {
    /// Creates a client for the lookup endpoint at `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Creates a client for [`DEFAULT_LOOKUP_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UrlParse`] if the built-in URL does not parse.
    pub fn try_default() -> Result<Self, LookupError> {
        Self::try_from(DEFAULT_LOOKUP_URL)
    }

    /// Returns the lookup endpoint.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets a timeout for every lookup request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds headers sent with every lookup request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Looks up the deposit address of `tag`.
    ///
    /// The tag is trimmed; the returned address has a verified checksum.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the request fails, the response is not
    /// understood, or it carries no valid address.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "topupgo.lookup.deposit_address", skip(self), err)
    )]
    pub async fn lookup(&self, tag: &str) -> Result<Address, LookupError> {
        const CONTEXT: &str = "GET deposit-address";

        let mut req = self
            .client
            .get(self.url.clone())
            .query(&[("username", tag.trim())])
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| LookupError::Http {
            context: CONTEXT,
            source: e,
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::ResponseBodyRead {
                context: CONTEXT,
                source: e,
            })?;
        if !status.is_success() {
            return Err(LookupError::HttpStatus {
                context: CONTEXT,
                status,
                body,
            });
        }

        let parsed: DepositAddressResponse =
            serde_json::from_str(&body).map_err(|e| LookupError::JsonDeserialization {
                context: CONTEXT,
                source: e,
            })?;
        let raw = parsed
            .data
            .and_then(|d| d.deposit_address)
            .filter(|a| parsed.status && !a.is_empty())
            .ok_or_else(|| {
                LookupError::NotFound(
                    parsed
                        .message
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_NOT_FOUND.to_owned()),
                )
            })?;
        Ok(normalize_address(&raw)?)
    }
}

impl TryFrom<&str> for DepositAddressClient {
    type Error = LookupError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|e| LookupError::UrlParse {
            context: "Failed to parse lookup URL",
            source: e,
        })?;
        Ok(Self::new(url))
    }
}

impl AddressResolver for DepositAddressClient {
    async fn resolve(&self, tag: &str) -> Result<Address, ResolveError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ResolveError::EmptyTag);
        }
        match self.lookup(tag).await {
            Ok(address) => {
                tracing::debug!(%tag, %address, "Resolved recipient tag");
                Ok(address)
            }
            Err(err) => {
                tracing::debug!(%tag, error = %err, "Recipient tag lookup failed");
                Err(err.into_resolve_error(tag))
            }
        }
    }
}
