use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A contest account as registered in the roster.
///
/// The roster is loaded once at startup from configuration and never
/// changes for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub server: String,
    pub password: String,
    pub contestant_name: String,
}

/// A closed deal leg reported by the trading terminal.
///
/// Two legs (open + close) make up one round-trip trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub ticket: i64,
    pub symbol: String,
    pub volume: Decimal,
    pub profit: Decimal,
    pub time: DateTime<Utc>,
}

/// Balance and equity of an account at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: Decimal,
    pub equity: Decimal,
}

/// An open position held by an account at sample time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub ticket: i64,
    pub symbol: String,
    pub volume: Decimal,
    pub profit: Decimal,
}
