use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::breach::BreachEvent;
use crate::metrics::MetricsSnapshot;
use crate::types::OpenPosition;

/// Everything one sampling pass produced for one account.
///
/// `balance` already carries the breach adjustment: it equals equity when a
/// breach fired this pass, the raw account balance otherwise. The metrics
/// inside were computed from the raw balance before adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReport {
    pub account_id: String,
    pub contestant_name: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub starting_day_balance: Decimal,
    pub daily_dd_limit: Decimal,
    pub metrics: MetricsSnapshot,
    pub open_positions: Vec<OpenPosition>,
    pub breaches: Vec<BreachEvent>,
    pub breached: bool,
    pub generated_at: DateTime<Utc>,
}
