//! Row models for the leaderboard tables.

use chrono::{DateTime, Utc};
use contest_core::breach::BreachEvent;
use contest_core::metrics::MetadataSummary;
use contest_core::report::AccountReport;
use contest_core::types::OpenPosition;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// One row of the `leaderboard` table.
///
/// Anything the API ranks or filters on has its own column; symbol counts,
/// open positions and the breach log ride along as JSONB. The JSONB payloads
/// are typed rather than raw values so symbol counts keep their
/// first-encounter ordering through a write/read cycle.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntryRecord {
    /// Trading account login, the table's primary key.
    pub account_id: String,
    /// Display name shown on the leaderboard.
    pub contestant_name: String,
    /// Balance after breach adjustment (equity at the moment of breach).
    pub balance: Decimal,
    pub equity: Decimal,
    /// Balance the account opened the current day with.
    pub starting_day_balance: Decimal,
    /// Daily drawdown floor in force when the row was last merged.
    pub daily_dd_limit: Decimal,
    pub lots_traded: Decimal,
    pub average_lots: Decimal,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub win_rate: Decimal,
    /// Deal count per symbol, first-encounter ordered.
    pub symbol_trade_counts: Json<IndexMap<String, i64>>,
    pub most_traded_symbol: Option<String>,
    pub most_traded_count: i64,
    pub profit_loss: Decimal,
    pub return_pct: Decimal,
    /// Open positions snapshot from the latest merge.
    pub open_positions: Json<Vec<OpenPosition>>,
    /// Accumulated breach log; the merge upsert appends, never rewrites.
    pub breaches: Json<Vec<BreachEvent>>,
    pub breached: bool,
    pub last_update_time: DateTime<Utc>,
}

impl LeaderboardEntryRecord {
    /// Maps one sampling pass report onto a row ready for the merge upsert.
    #[must_use]
    pub fn from_report(report: &AccountReport) -> Self {
        Self {
            account_id: report.account_id.clone(),
            contestant_name: report.contestant_name.clone(),
            balance: report.balance,
            equity: report.equity,
            starting_day_balance: report.starting_day_balance,
            daily_dd_limit: report.daily_dd_limit,
            lots_traded: report.metrics.lots_traded,
            average_lots: report.metrics.average_lots,
            total_trades: report.metrics.total_trades,
            winning_trades: report.metrics.winning_trades,
            losing_trades: report.metrics.losing_trades,
            win_rate: report.metrics.win_rate,
            symbol_trade_counts: Json(report.metrics.symbol_trade_counts.clone()),
            most_traded_symbol: report.metrics.most_traded_symbol.clone(),
            most_traded_count: report.metrics.most_traded_count,
            profit_loss: report.metrics.profit_loss,
            return_pct: report.metrics.return_pct,
            open_positions: Json(report.open_positions.clone()),
            breaches: Json(report.breaches.clone()),
            breached: report.breached,
            last_update_time: report.generated_at,
        }
    }
}

/// The singleton row of the `leaderboard_metadata` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetadataRecord {
    /// Deal count per symbol summed across every account.
    pub global_trade_counts: Json<IndexMap<String, i64>>,
    pub most_traded_symbol: Option<String>,
    pub most_traded_count: i64,
    pub last_update_time: DateTime<Utc>,
}

impl MetadataRecord {
    #[must_use]
    pub fn from_summary(summary: &MetadataSummary, at: DateTime<Utc>) -> Self {
        Self {
            global_trade_counts: Json(summary.global_trade_counts.clone()),
            most_traded_symbol: summary.most_traded_symbol.clone(),
            most_traded_count: summary.most_traded_count,
            last_update_time: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contest_core::breach::BreachKind;
    use contest_core::metrics::MetricsSnapshot;
    use rust_decimal_macros::dec;

    fn sample_report() -> AccountReport {
        let mut symbol_trade_counts = IndexMap::new();
        symbol_trade_counts.insert("XAUUSD".to_string(), 4_i64);
        symbol_trade_counts.insert("EURUSD".to_string(), 2_i64);

        AccountReport {
            account_id: "101".to_string(),
            contestant_name: "Alice".to_string(),
            balance: dec!(98500.00),
            equity: dec!(98200.00),
            starting_day_balance: dec!(100000),
            daily_dd_limit: dec!(97000.00),
            metrics: MetricsSnapshot {
                lots_traded: dec!(0.60),
                average_lots: dec!(0.20),
                total_trades: 3,
                winning_trades: 4,
                losing_trades: 2,
                win_rate: dec!(66.67),
                symbol_trade_counts,
                most_traded_symbol: Some("XAUUSD".to_string()),
                most_traded_count: 4,
                profit_loss: dec!(-1500.00),
                return_pct: dec!(-1.50),
            },
            open_positions: vec![OpenPosition {
                ticket: 555,
                symbol: "XAUUSD".to_string(),
                volume: dec!(0.10),
                profit: dec!(-300.00),
            }],
            breaches: Vec::new(),
            breached: false,
            generated_at: Utc.with_ymd_and_hms(2025, 3, 4, 12, 5, 0).unwrap(),
        }
    }

    // ==== Report mapping ====

    #[test]
    fn record_mirrors_report_fields() {
        let report = sample_report();
        let record = LeaderboardEntryRecord::from_report(&report);

        assert_eq!(record.account_id, "101");
        assert_eq!(record.contestant_name, "Alice");
        assert_eq!(record.balance, dec!(98500.00));
        assert_eq!(record.daily_dd_limit, dec!(97000.00));
        assert_eq!(record.total_trades, 3);
        assert_eq!(record.win_rate, dec!(66.67));
        assert_eq!(record.most_traded_symbol.as_deref(), Some("XAUUSD"));
        assert_eq!(record.open_positions.0.len(), 1);
        assert!(record.breaches.0.is_empty());
        assert!(!record.breached);
        assert_eq!(record.last_update_time, report.generated_at);
    }

    #[test]
    fn breach_log_travels_with_the_record() {
        let mut report = sample_report();
        report.breached = true;
        report.breaches.push(BreachEvent {
            time: report.generated_at,
            kind: BreachKind::DailyDrawdown,
            account_id: report.account_id.clone(),
            contestant_name: report.contestant_name.clone(),
            equity: dec!(96000),
            limit: dec!(97000.00),
        });

        let record = LeaderboardEntryRecord::from_report(&report);
        assert!(record.breached);
        assert_eq!(record.breaches.0.len(), 1);
        assert_eq!(record.breaches.0[0].kind, BreachKind::DailyDrawdown);
    }

    // ==== JSONB payloads ====

    #[test]
    fn symbol_counts_keep_first_encounter_order() {
        let record = LeaderboardEntryRecord::from_report(&sample_report());

        let json = serde_json::to_string(&record.symbol_trade_counts).unwrap();
        let back: IndexMap<String, i64> = serde_json::from_str(&json).unwrap();

        let keys: Vec<&str> = back.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["XAUUSD", "EURUSD"]);
    }

    #[test]
    fn breach_events_serialize_with_snake_case_type() {
        let mut report = sample_report();
        report.breaches.push(BreachEvent {
            time: report.generated_at,
            kind: BreachKind::MaxDrawdown,
            account_id: report.account_id.clone(),
            contestant_name: report.contestant_name.clone(),
            equity: dec!(94000),
            limit: dec!(95000),
        });

        let record = LeaderboardEntryRecord::from_report(&report);
        let json = serde_json::to_value(&record.breaches).unwrap();
        assert_eq!(json[0]["type"], "max_drawdown");
    }

    // ==== Metadata ====

    #[test]
    fn metadata_record_mirrors_summary() {
        let report = sample_report();
        let summary = MetadataSummary::from_snapshots([&report.metrics]);
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 12, 5, 1).unwrap();

        let record = MetadataRecord::from_summary(&summary, at);

        assert_eq!(record.global_trade_counts.0.get("XAUUSD"), Some(&4));
        assert_eq!(record.most_traded_symbol.as_deref(), Some("XAUUSD"));
        assert_eq!(record.most_traded_count, 4);
        assert_eq!(record.last_update_time, at);
    }
}
