//! Per-account trading metrics and cross-account aggregation.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Deal;

/// Metrics computed for one account in one sampling pass.
///
/// Deals arrive as individual legs; a round-trip trade is two legs, which is
/// why `total_trades` halves the deal count while lots and win counts stay
/// at leg granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub lots_traded: Decimal,
    pub average_lots: Decimal,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    /// Percentage of decided legs that were profitable, two decimals.
    pub win_rate: Decimal,
    /// Deal count per symbol, keyed in first-encounter order.
    pub symbol_trade_counts: IndexMap<String, i64>,
    pub most_traded_symbol: Option<String>,
    pub most_traded_count: i64,
    pub profit_loss: Decimal,
    pub return_pct: Decimal,
}

impl MetricsSnapshot {
    /// Computes the full metrics set from an account's deal history.
    ///
    /// `balance` is the account balance at sample time, before any breach
    /// adjustment. Zero-profit legs count toward neither wins nor losses.
    #[must_use]
    pub fn compute(deals: &[Deal], balance: Decimal, initial_balance: Decimal) -> Self {
        let mut lots = Decimal::ZERO;
        let mut winning_trades = 0i64;
        let mut losing_trades = 0i64;
        let mut symbol_trade_counts: IndexMap<String, i64> = IndexMap::new();

        for deal in deals {
            lots += deal.volume;
            if deal.profit > Decimal::ZERO {
                winning_trades += 1;
            } else if deal.profit < Decimal::ZERO {
                losing_trades += 1;
            }
            *symbol_trade_counts.entry(deal.symbol.clone()).or_insert(0) += 1;
        }

        #[allow(clippy::cast_possible_wrap)]
        let total_trades = (deals.len() / 2) as i64;

        let average_lots = if total_trades > 0 {
            (lots / Decimal::from(total_trades)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        let decided = winning_trades + losing_trades;
        let win_rate = if decided > 0 {
            (Decimal::from(winning_trades) / Decimal::from(decided) * Decimal::ONE_HUNDRED)
                .round_dp(2)
        } else {
            Decimal::ZERO
        };

        let (most_traded_symbol, most_traded_count) = most_traded(&symbol_trade_counts);

        let profit_loss = (balance - initial_balance).round_dp(2);
        let return_pct = if initial_balance.is_zero() {
            Decimal::ZERO
        } else {
            (profit_loss / initial_balance * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            lots_traded: lots.round_dp(2),
            average_lots,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            symbol_trade_counts,
            most_traded_symbol,
            most_traded_count,
            profit_loss,
            return_pct,
        }
    }
}

/// Symbol activity aggregated across every account in a sampling pass.
///
/// Recomputed from scratch each pass, never accumulated across passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub global_trade_counts: IndexMap<String, i64>,
    pub most_traded_symbol: Option<String>,
    pub most_traded_count: i64,
}

impl MetadataSummary {
    #[must_use]
    pub fn from_snapshots<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a MetricsSnapshot>,
    {
        let mut global_trade_counts: IndexMap<String, i64> = IndexMap::new();
        for snapshot in snapshots {
            for (symbol, count) in &snapshot.symbol_trade_counts {
                *global_trade_counts.entry(symbol.clone()).or_insert(0) += count;
            }
        }

        let (most_traded_symbol, most_traded_count) = most_traded(&global_trade_counts);

        Self {
            global_trade_counts,
            most_traded_symbol,
            most_traded_count,
        }
    }
}

/// Highest count wins; on a tie the symbol encountered first keeps the spot.
fn most_traded(counts: &IndexMap<String, i64>) -> (Option<String>, i64) {
    let mut best: Option<(&str, i64)> = None;
    for (symbol, &count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((symbol, count)),
        }
    }

    match best {
        Some((symbol, count)) => (Some(symbol.to_string()), count),
        None => (None, 0),
    }
}
