#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM support for the TopupGo payment flow.
//!
//! Reads ERC-20 balances across the backing contracts of a stablecoin,
//! publishes the aggregate for display, and submits transfers from the first
//! contract that covers the requested amount. Everything on-chain goes
//! through the [`TokenLedger`](ledger::TokenLedger) trait, implemented for
//! alloy providers by [`AlloyLedger`](ledger::AlloyLedger).
//!
//! # Modules
//!
//! - [`balance`] - Aggregate balance view with periodic and triggered refresh
//! - [`contract`] - ERC-20 bindings
//! - [`error`] - Ledger and configuration errors
//! - [`ledger`] - Token ledger trait and its alloy implementation
//! - [`payment`] - Payment submitter with first-fit contract selection
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans around ledger calls and submissions

pub mod balance;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod payment;

mod networks;
pub use networks::*;

#[cfg(test)]
mod testing;
