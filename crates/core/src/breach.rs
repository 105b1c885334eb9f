//! Drawdown rule evaluation.
//!
//! An account is either active or breached, and the transition is one-way:
//! once a breach is recorded the account is frozen on the leaderboard.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    DailyDrawdown,
    MaxDrawdown,
}

impl BreachKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DailyDrawdown => "daily_drawdown",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}

/// A recorded rule violation. Serialized into the account's breach log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachEvent {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BreachKind,
    pub account_id: String,
    pub contestant_name: String,
    pub equity: Decimal,
    pub limit: Decimal,
}

/// Contest drawdown thresholds.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub initial_balance: Decimal,
    pub daily_drawdown_factor: Decimal,
    pub max_drawdown_factor: Decimal,
}

impl RiskLimits {
    /// Daily floor derived from the balance the account opened the day with.
    #[must_use]
    pub fn daily_limit(&self, starting_day_balance: Decimal) -> Decimal {
        (starting_day_balance * self.daily_drawdown_factor).round_dp(2)
    }

    /// Absolute floor derived from the contest's initial balance.
    #[must_use]
    pub fn max_limit(&self) -> Decimal {
        self.initial_balance * self.max_drawdown_factor
    }
}

/// Outcome of evaluating one account against the drawdown rules.
#[derive(Debug, Clone)]
pub struct BreachAssessment {
    /// Equity when breached, otherwise the unmodified balance.
    pub adjusted_balance: Decimal,
    /// Daily floor in force during this evaluation.
    pub daily_limit: Decimal,
    pub events: Vec<BreachEvent>,
    pub breached: bool,
}

/// Evaluates the drawdown rules for one account sample.
///
/// The daily floor takes priority: when equity is below both floors only a
/// daily drawdown event is recorded.
#[must_use]
pub fn assess(
    account: &Account,
    equity: Decimal,
    balance: Decimal,
    starting_day_balance: Decimal,
    limits: &RiskLimits,
    at: DateTime<Utc>,
) -> BreachAssessment {
    let daily_limit = limits.daily_limit(starting_day_balance);
    let mut events = Vec::new();

    if equity < daily_limit {
        events.push(BreachEvent {
            time: at,
            kind: BreachKind::DailyDrawdown,
            account_id: account.account_id.clone(),
            contestant_name: account.contestant_name.clone(),
            equity,
            limit: daily_limit,
        });
    } else if equity < limits.max_limit() {
        events.push(BreachEvent {
            time: at,
            kind: BreachKind::MaxDrawdown,
            account_id: account.account_id.clone(),
            contestant_name: account.contestant_name.clone(),
            equity,
            limit: limits.max_limit(),
        });
    }

    let breached = !events.is_empty();
    let adjusted_balance = if breached { equity } else { balance };

    BreachAssessment {
        adjusted_balance,
        daily_limit,
        events,
        breached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn contest_limits() -> RiskLimits {
        RiskLimits {
            initial_balance: dec!(100000),
            daily_drawdown_factor: dec!(0.97),
            max_drawdown_factor: dec!(0.95),
        }
    }

    fn sample_account() -> Account {
        Account {
            account_id: "101".to_string(),
            server: "Demo-Server".to_string(),
            password: "secret".to_string(),
            contestant_name: "Alice".to_string(),
        }
    }

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
    }

    // ==== Daily drawdown ====

    #[test]
    fn equity_under_daily_floor_breaches() {
        let assessment = assess(
            &sample_account(),
            dec!(96000),
            dec!(98500),
            dec!(100000),
            &contest_limits(),
            sample_time(),
        );

        assert!(assessment.breached);
        assert_eq!(assessment.events.len(), 1);
        assert_eq!(assessment.events[0].kind, BreachKind::DailyDrawdown);
        assert_eq!(assessment.events[0].limit, dec!(97000.00));
        assert_eq!(assessment.events[0].equity, dec!(96000));
        assert_eq!(assessment.adjusted_balance, dec!(96000));
    }

    #[test]
    fn daily_floor_follows_starting_day_balance() {
        // A profitable day raises the floor above the max drawdown line.
        let assessment = assess(
            &sample_account(),
            dec!(101000),
            dec!(101500),
            dec!(105000),
            &contest_limits(),
            sample_time(),
        );

        assert!(assessment.breached);
        assert_eq!(assessment.events[0].kind, BreachKind::DailyDrawdown);
        assert_eq!(assessment.events[0].limit, dec!(101850.00));
    }

    // ==== Max drawdown ====

    #[test]
    fn equity_under_max_floor_only_breaches_max() {
        // Starting day balance already ground down: daily floor sits below
        // the max floor, equity lands between them.
        let assessment = assess(
            &sample_account(),
            dec!(94000),
            dec!(94200),
            dec!(96000),
            &contest_limits(),
            sample_time(),
        );

        assert!(assessment.breached);
        assert_eq!(assessment.events.len(), 1);
        assert_eq!(assessment.events[0].kind, BreachKind::MaxDrawdown);
        assert_eq!(assessment.events[0].limit, dec!(95000.00));
        assert_eq!(assessment.adjusted_balance, dec!(94000));
    }

    // ==== Priority ====

    #[test]
    fn daily_floor_wins_when_both_violated() {
        let assessment = assess(
            &sample_account(),
            dec!(90000),
            dec!(91000),
            dec!(100000),
            &contest_limits(),
            sample_time(),
        );

        assert_eq!(assessment.events.len(), 1);
        assert_eq!(assessment.events[0].kind, BreachKind::DailyDrawdown);
    }

    // ==== No breach ====

    #[test]
    fn healthy_account_keeps_balance() {
        let assessment = assess(
            &sample_account(),
            dec!(99000),
            dec!(99500),
            dec!(100000),
            &contest_limits(),
            sample_time(),
        );

        assert!(!assessment.breached);
        assert!(assessment.events.is_empty());
        assert_eq!(assessment.adjusted_balance, dec!(99500));
        assert_eq!(assessment.daily_limit, dec!(97000.00));
    }

    #[test]
    fn equity_exactly_on_floor_is_not_a_breach() {
        let assessment = assess(
            &sample_account(),
            dec!(97000),
            dec!(97500),
            dec!(100000),
            &contest_limits(),
            sample_time(),
        );

        assert!(!assessment.breached);
    }

    // ==== Serialization ====

    #[test]
    fn breach_event_serializes_with_snake_case_type() {
        let event = BreachEvent {
            time: sample_time(),
            kind: BreachKind::MaxDrawdown,
            account_id: "101".to_string(),
            contestant_name: "Alice".to_string(),
            equity: dec!(94000),
            limit: dec!(95000),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "max_drawdown");
        assert_eq!(json["account_id"], "101");
    }
}
