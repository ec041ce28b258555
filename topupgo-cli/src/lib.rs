//! Command-line wallet for the TopupGo payment flow.
//!
//! Provides configuration loading and a local-key wallet session used by the
//! `topupgo` binary.

pub mod config;
pub mod session;
