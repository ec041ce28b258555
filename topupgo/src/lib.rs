#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the TopupGo stablecoin payment flow.
//!
//! This crate holds the chain-agnostic half of the payment core: amount
//! conversion, the error taxonomy, the notification port, the collaborator
//! traits for the embedded wallet, and the pieces of the send and top-up
//! flows that do not talk to a chain directly. The EVM side lives in
//! `topupgo-evm` and the deposit-address lookup in `topupgo-http`.
//!
//! # Overview
//!
//! A user sends a stablecoin to another user identified by a tag. The tag is
//! resolved to a deposit address through a remote lookup, a backing token
//! contract holding enough balance is picked, and an ERC-20 transfer is
//! submitted and confirmed. Balances of all backing contracts are summed for
//! display. Top-ups go through the wallet's checkout surface.
//!
//! # Modules
//!
//! - [`amount`] - Decimal string and smallest-unit conversion
//! - [`chain`] - Chain IDs, CAIP-2 formatting, accounts, address checksums
//! - [`checkout`] - Top-up checkout launcher with wallet UI fallback
//! - [`config`] - Stablecoin and backing contract configuration
//! - [`error`] - Payment error taxonomy and RPC failure classification
//! - [`notify`] - Notification port and its tracing/in-memory sinks
//! - [`profile`] - Display profile derived from the user record
//! - [`recipient`] - Tag resolution and the recipient input state machine
//! - [`retry`] - Fixed-delay retry policy
//! - [`session`] - Embedded-wallet session and checkout capability traits

pub mod amount;
pub mod chain;
pub mod checkout;
pub mod config;
pub mod error;
pub mod notify;
pub mod profile;
pub mod recipient;
pub mod retry;
pub mod session;
