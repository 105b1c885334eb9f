use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::report::AccountReport;
use crate::types::{Account, AccountInfo, Deal, OpenPosition};

/// Session-oriented access to a trading terminal.
///
/// The terminal is treated as unreliable by contract: implementations never
/// surface transport errors. A failed connect returns `false`, a failed
/// fetch returns `None` or an empty list, and the caller decides whether to
/// skip the account.
#[async_trait]
pub trait TerminalClient: Send + Sync {
    /// Opens a session for the given account, ending any previous session.
    async fn connect(&self, account: &Account) -> bool;

    /// Balance and equity for the connected account.
    async fn account_info(&self) -> Option<AccountInfo>;

    /// Closed deal legs for the connected account within `[from, to]`.
    async fn history_deals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Deal>;

    /// Open positions for the connected account.
    async fn open_positions(&self) -> Vec<OpenPosition>;

    /// Tears down the current session. Always called, even after failures.
    async fn disconnect(&self);
}

/// Result of merging a single account report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The row was inserted or updated.
    Applied,
    /// The row is frozen by an earlier breach; nothing was written.
    Latched,
}

/// Per-batch merge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub applied: usize,
    pub latched: usize,
}

/// Durable leaderboard state shared by the monitor and the read API.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Merges one report, honoring the breach latch.
    async fn merge_report(&self, report: &AccountReport) -> Result<MergeOutcome>;

    /// Merges a full sampling pass in one transaction.
    async fn merge_reports(&self, reports: &[AccountReport]) -> Result<MergeSummary>;

    /// Recomputes the cross-account metadata row from this pass's reports.
    async fn aggregate_metadata(&self, reports: &[AccountReport]) -> Result<()>;

    /// Persisted starting day balance, `None` for accounts without a row.
    async fn starting_day_balance(&self, account_id: &str) -> Result<Option<Decimal>>;

    /// Writes the starting day balance immediately, outside the batch merge.
    async fn update_starting_day_balance(&self, account_id: &str, value: Decimal) -> Result<()>;

    /// Accounts whose rows are frozen by the breach latch.
    async fn latched_accounts(&self) -> Result<HashSet<String>>;
}
