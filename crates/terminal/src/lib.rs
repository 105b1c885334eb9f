//! MT5 bridge terminal access for contest monitoring.
//!
//! This crate provides:
//! - Rate-limited REST client for the MT5 bridge gateway
//! - Scripted in-memory terminal for tests and dry runs
//! - Typed errors with transient/retryable classification
//!
//! The bridge gateway exposes one terminal session at a time:
//!
//! - `POST /connect` - open a session for an account
//! - `GET /account-info` - balance and equity
//! - `GET /history-deals?from=&to=` - closed deal legs in a window
//! - `GET /positions` - open positions
//! - `POST /disconnect` - tear the session down

pub mod bridge;
pub mod error;
pub mod sim;

pub use bridge::{BridgeConfig, BridgeTerminal};
pub use error::{Result, TerminalError};
pub use sim::{SimScript, SimTerminal};
