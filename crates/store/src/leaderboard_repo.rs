//! Repository for the leaderboard and its metadata singleton.
//!
//! All writes funnel through a merge upsert whose `WHERE NOT breached`
//! guard implements the breach latch: once a row is marked breached it
//! keeps the values it had at the moment of the breach.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use contest_core::metrics::MetadataSummary;
use contest_core::report::AccountReport;
use contest_core::traits::{LeaderboardStore, MergeOutcome, MergeSummary};

use crate::models::{LeaderboardEntryRecord, MetadataRecord};
use crate::retry::RetryPolicy;

/// Typed access to the `leaderboard` and `leaderboard_metadata` tables.
#[derive(Debug, Clone)]
pub struct LeaderboardRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl LeaderboardRepository {
    /// Creates a new repository instance with the default retry schedule.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry schedule applied to every statement.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full leaderboard ordered by profit, best first.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardEntryRecord>> {
        let rows = self
            .retry
            .run("fetch leaderboard", || self.read_leaderboard())
            .await?;
        Ok(rows)
    }

    /// The metadata singleton, `None` before the first sampling pass.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn fetch_metadata(&self) -> Result<Option<MetadataRecord>> {
        let record = self
            .retry
            .run("fetch leaderboard metadata", || self.read_metadata())
            .await?;
        Ok(record)
    }

    async fn read_leaderboard(&self) -> Result<Vec<LeaderboardEntryRecord>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT account_id, contestant_name, balance, equity, starting_day_balance,
                   daily_dd_limit, lots_traded, average_lots, total_trades, winning_trades,
                   losing_trades, win_rate, symbol_trade_counts, most_traded_symbol,
                   most_traded_count, profit_loss, return_pct, open_positions, breaches,
                   breached, last_update_time
            FROM leaderboard
            ORDER BY profit_loss DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn read_metadata(&self) -> Result<Option<MetadataRecord>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT global_trade_counts, most_traded_symbol, most_traded_count, last_update_time
            FROM leaderboard_metadata
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
    }

    async fn merge_pass(&self, reports: &[AccountReport]) -> Result<MergeSummary, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut summary = MergeSummary::default();

        for report in reports {
            let record = LeaderboardEntryRecord::from_report(report);
            let rows = upsert_row(&mut tx, &record).await?;
            if rows == 0 {
                summary.latched += 1;
            } else {
                summary.applied += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn write_metadata(&self, record: &MetadataRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO leaderboard_metadata
                (id, global_trade_counts, most_traded_symbol, most_traded_count, last_update_time)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                global_trade_counts = EXCLUDED.global_trade_counts,
                most_traded_symbol = EXCLUDED.most_traded_symbol,
                most_traded_count = EXCLUDED.most_traded_count,
                last_update_time = EXCLUDED.last_update_time
            ",
        )
        .bind(&record.global_trade_counts)
        .bind(&record.most_traded_symbol)
        .bind(record.most_traded_count)
        .bind(record.last_update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_starting_day_balance(
        &self,
        account_id: &str,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        sqlx::query_scalar(r"SELECT starting_day_balance FROM leaderboard WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn write_starting_day_balance(
        &self,
        account_id: &str,
        value: Decimal,
    ) -> Result<(), sqlx::Error> {
        // A missing row is fine: the value reaches the table through the
        // batch merge at the end of the same pass.
        sqlx::query(
            r"
            UPDATE leaderboard
            SET starting_day_balance = $2
            WHERE account_id = $1 AND NOT breached
            ",
        )
        .bind(account_id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_latched(&self) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<String> =
            sqlx::query_scalar(r"SELECT account_id FROM leaderboard WHERE breached")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl LeaderboardStore for LeaderboardRepository {
    async fn merge_report(&self, report: &AccountReport) -> Result<MergeOutcome> {
        let summary = self.merge_reports(std::slice::from_ref(report)).await?;
        Ok(if summary.latched > 0 {
            MergeOutcome::Latched
        } else {
            MergeOutcome::Applied
        })
    }

    async fn merge_reports(&self, reports: &[AccountReport]) -> Result<MergeSummary> {
        let summary = self
            .retry
            .run("merge leaderboard rows", || self.merge_pass(reports))
            .await?;
        Ok(summary)
    }

    async fn aggregate_metadata(&self, reports: &[AccountReport]) -> Result<()> {
        let summary = MetadataSummary::from_snapshots(reports.iter().map(|r| &r.metrics));
        let record = MetadataRecord::from_summary(&summary, Utc::now());
        self.retry
            .run("write leaderboard metadata", || self.write_metadata(&record))
            .await?;
        Ok(())
    }

    async fn starting_day_balance(&self, account_id: &str) -> Result<Option<Decimal>> {
        let value = self
            .retry
            .run("read starting day balance", || {
                self.read_starting_day_balance(account_id)
            })
            .await?;
        Ok(value)
    }

    async fn update_starting_day_balance(&self, account_id: &str, value: Decimal) -> Result<()> {
        self.retry
            .run("write starting day balance", || {
                self.write_starting_day_balance(account_id, value)
            })
            .await?;
        Ok(())
    }

    async fn latched_accounts(&self) -> Result<HashSet<String>> {
        let accounts = self
            .retry
            .run("read latched accounts", || self.read_latched())
            .await?;
        Ok(accounts)
    }
}

/// Applies one row through the merge upsert and reports affected rows.
///
/// Zero affected rows means the latch held: the row exists and is
/// already breached.
async fn upsert_row(
    tx: &mut PgConnection,
    record: &LeaderboardEntryRecord,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        INSERT INTO leaderboard (
            account_id, contestant_name, balance, equity, starting_day_balance,
            daily_dd_limit, lots_traded, average_lots, total_trades, winning_trades,
            losing_trades, win_rate, symbol_trade_counts, most_traded_symbol,
            most_traded_count, profit_loss, return_pct, open_positions, breaches,
            breached, last_update_time
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21)
        ON CONFLICT (account_id) DO UPDATE SET
            contestant_name = EXCLUDED.contestant_name,
            balance = EXCLUDED.balance,
            equity = EXCLUDED.equity,
            starting_day_balance = EXCLUDED.starting_day_balance,
            daily_dd_limit = EXCLUDED.daily_dd_limit,
            lots_traded = EXCLUDED.lots_traded,
            average_lots = EXCLUDED.average_lots,
            total_trades = EXCLUDED.total_trades,
            winning_trades = EXCLUDED.winning_trades,
            losing_trades = EXCLUDED.losing_trades,
            win_rate = EXCLUDED.win_rate,
            symbol_trade_counts = EXCLUDED.symbol_trade_counts,
            most_traded_symbol = EXCLUDED.most_traded_symbol,
            most_traded_count = EXCLUDED.most_traded_count,
            profit_loss = EXCLUDED.profit_loss,
            return_pct = EXCLUDED.return_pct,
            open_positions = EXCLUDED.open_positions,
            breaches = leaderboard.breaches || EXCLUDED.breaches,
            breached = leaderboard.breached OR EXCLUDED.breached,
            last_update_time = EXCLUDED.last_update_time
        WHERE NOT leaderboard.breached
        ",
    )
    .bind(&record.account_id)
    .bind(&record.contestant_name)
    .bind(record.balance)
    .bind(record.equity)
    .bind(record.starting_day_balance)
    .bind(record.daily_dd_limit)
    .bind(record.lots_traded)
    .bind(record.average_lots)
    .bind(record.total_trades)
    .bind(record.winning_trades)
    .bind(record.losing_trades)
    .bind(record.win_rate)
    .bind(&record.symbol_trade_counts)
    .bind(&record.most_traded_symbol)
    .bind(record.most_traded_count)
    .bind(record.profit_loss)
    .bind(record.return_pct)
    .bind(&record.open_positions)
    .bind(&record.breaches)
    .bind(record.breached)
    .bind(record.last_update_time)
    .execute(&mut *tx)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn repository_builds_from_lazy_pool() {
        let pool = PgPool::connect_lazy("postgresql://localhost/contest_test").unwrap();
        let repo = LeaderboardRepository::new(pool)
            .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(100)));

        assert_eq!(repo.retry.max_attempts, 5);
        let cloned = repo.clone();
        assert_eq!(cloned.retry.delay, Duration::from_millis(100));
    }
}
