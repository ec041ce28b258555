#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the TopupGo payment flow.
//!
//! Provides [`DepositAddressClient`], a `reqwest` client for the
//! deposit-address lookup API that turns recipient tags into checksummed
//! addresses and implements [`topupgo::recipient::AddressResolver`].
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing span around each lookup request

pub mod lookup;

pub use lookup::{DEFAULT_LOOKUP_URL, DepositAddressClient, LookupError};
